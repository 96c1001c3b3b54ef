//! Data model of a decoded ensemble.
//!
//! Records for services, service components and subchannels live in
//! fixed-capacity tables and are addressed by slot index. Ensemble-wide
//! metadata, labels, service linking sets and the FIB/FIG framing complete
//! the model.

pub mod component;
pub mod ensemble;
pub mod fig;
pub mod label;
pub mod linking;
pub mod service;
pub mod subchannel;
pub mod table;
