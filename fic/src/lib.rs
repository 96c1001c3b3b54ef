//! Decoder for the Fast Information Channel (FIC) of Digital Audio
//! Broadcasting, following ETSI EN 300 401.
//!
//! ## Technical Overview
//!
//! The FIC carries the multiplex configuration of an ensemble: which
//! services exist, which components they are made of, and where in the main
//! service channel each component's subchannel lives.
//!
//! ### Channel Organization
//!
//! **Transport**: The first three OFDM symbols of every transmission frame
//! carry the FIC as punctured, convolutionally coded soft bits. Every 2304
//! soft bits form a code word that decodes to three Fast Information Blocks.
//! **FIBs**: 30 data bytes of concatenated Fast Information Groups followed
//! by a CRC16.
//!
//! ### Transmission Modes
//!
//! - Mode I: 1536 carriers, 12 FIBs per frame
//! - Mode II: 384 carriers, 3 FIBs per frame
//! - Mode IV: 768 carriers, 6 FIBs per frame
//!
//! ### Information Model
//!
//! Services, service components and subchannels are cross-referenced by id.
//! A service becomes visible once it is labelled and has a component; until
//! then queries treat it as unknown.
//!
//! ## Quick Start
//!
//! 1. Create a [`process::handler::FicHandler`] for the transmission mode
//! 2. Register callbacks for the notifications of interest
//! 3. Feed the soft bits of FIC symbols 1..=3 of each frame
//! 4. Query the shared [`process::decode::FibDecoder`] at any time
//!
//! ```rust,no_run
//! use fic::process::{TransmissionMode, handler::FicHandler};
//!
//! let mut handler = FicHandler::new(TransmissionMode::I);
//! let decoder = handler.decoder();
//!
//! handler.on_service(move |id, label| {
//!     println!("0x{id:04X} {}", label.text.trim_end());
//! });
//!
//! // Soft bits of one frame, as delivered by the OFDM demodulator
//! let frame = vec![vec![0i16; 3072]; 3];
//! for (symbol, soft) in frame.iter().enumerate() {
//!     handler.process_block(soft, symbol as u8 + 1)?;
//! }
//!
//! if let Some(audio) = decoder.audio_data("Radio 1", 0) {
//!     println!("subchannel {}", audio.sub_ch_id);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing stages from soft bits to a queryable ensemble.
///
/// 1. **Deframing** ([`process::deframe`]): De-puncturing, Viterbi decoding,
///    energy dispersal and CRC checks.
///
/// 2. **Decoding** ([`process::decode`]): FIG parsing into the ensemble
///    tables, with the extension handlers in [`process::fig0`] and
///    [`process::fig1`].
///
/// 3. **Queries** ([`process::query`]): Read accessors over the tables.
///
/// 4. **Handler** ([`process::handler`]): Ties the stages together and
///    dispatches notifications.
pub mod process;

/// Data structures of the ensemble information model.
///
/// - **FIGs** ([`structs::fig`]): FIB walking and FIG headers
/// - **Tables** ([`structs::table`]): Fixed capacity record arena
/// - **Services** ([`structs::service`]): Services and cross references
/// - **Components** ([`structs::component`]): Audio and packet components
/// - **Subchannels** ([`structs::subchannel`]): Protection and bit rates
/// - **Ensemble** ([`structs::ensemble`]): Ensemble level information
/// - **Labels** ([`structs::label`]): Labels and abbreviations
/// - **Linking** ([`structs::linking`]): Service linking sets
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bits** ([`utils::bits`]): Bit extraction from unpacked bit arrays
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bounded FIG field reads
/// - **CRC Validation** ([`utils::crc`]): FIB CRC16
/// - **Channel Coding** ([`utils::viterbi`], [`utils::puncture`],
///   [`utils::dispersal`]): Convolutional code, puncturing and PRBS
/// - **Character Sets** ([`utils::charset`]): Label text conversion
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
