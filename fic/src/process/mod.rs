use std::fmt::Display;

use crate::structs::label::Label;
use crate::utils::errors::ModeError;

/// Soft-bit deframing of FIC symbols into CRC-checked FIBs.
///
/// Provides the [`Deframer`](deframe::Deframer), which collects soft bits into
/// code words, reverses puncturing, convolutional coding and energy
/// dispersal, and validates every FIB.
pub mod deframe;

/// FIB decoding into the ensemble data model.
///
/// Provides the [`FibDecoder`](decode::FibDecoder), the single owner of the
/// service, component and subchannel tables.
pub mod decode;

/// FIG type 0 extension handlers.
pub mod fig0;

/// FIG type 1 label handlers.
pub mod fig1;

/// Read accessors over the decoded ensemble.
pub mod query;

/// Producer-side entry point tying deframing, decoding and notifications
/// together.
///
/// Provides the [`FicHandler`](handler::FicHandler).
pub mod handler;

/// Transmission modes with a FIC. Mode III is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionMode {
    I,
    II,
    IV,
}

impl TryFrom<u8> for TransmissionMode {
    type Error = ModeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TransmissionMode::I),
            2 => Ok(TransmissionMode::II),
            4 => Ok(TransmissionMode::IV),
            mode => Err(ModeError::Unsupported(mode)),
        }
    }
}

impl TransmissionMode {
    /// Active carriers per OFDM symbol.
    pub fn carriers(&self) -> usize {
        match self {
            TransmissionMode::I => 1536,
            TransmissionMode::II => 384,
            TransmissionMode::IV => 768,
        }
    }

    /// Soft bits per FIC symbol (two per carrier).
    pub fn soft_bits_per_symbol(&self) -> usize {
        2 * self.carriers()
    }

    pub fn fic_symbols(&self) -> u8 {
        3
    }

    /// FIBs carried by the FIC of one transmission frame.
    pub fn fibs_per_frame(&self) -> usize {
        match self {
            TransmissionMode::I => 12,
            TransmissionMode::II => 3,
            TransmissionMode::IV => 6,
        }
    }
}

impl Display for TransmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransmissionMode::I => "I",
            TransmissionMode::II => "II",
            TransmissionMode::IV => "IV",
        };
        write!(f, "Mode {name}")
    }
}

/// Notification produced while decoding a FIB.
///
/// Events are queued under the decoder lock and handed out once the FIB is
/// complete, in the order they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FicEvent {
    /// Ensemble id from FIG 0/0, once per sync.
    EnsembleId(u32),
    /// Ensemble label from FIG 1/0, once per sync.
    EnsembleName { id: u32, label: Label },
    /// A service became visible: it has a label and at least one component,
    /// or it was labelled as a data service.
    Service { id: u32, label: Label },
    /// Extended country code and international table id, once both are known.
    Country { ecc: u8, inter_table_id: u8 },
    /// A service linking rendering not seen recently.
    LinkInfo {
        sequence: u32,
        header: String,
        body: String,
    },
}

/// Classification of a service by its primary component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Audio,
    Packet,
    Unknown,
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceKind::Audio => "audio",
            ServiceKind::Packet => "packet",
            ServiceKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Kinds of decode errors reported by the deframing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A FIB failed its CRC.
    FibCrc,
}
