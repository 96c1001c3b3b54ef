//! Utility functions and supporting infrastructure.
//!
//! Provides bit extraction, CRC validation, the convolutional code, puncturing,
//! energy dispersal, label character sets and error handling.

pub mod bits;
pub mod bitstream_io;
pub mod charset;
pub mod crc;
pub mod dispersal;
pub mod errors;
pub mod puncture;
pub mod viterbi;
