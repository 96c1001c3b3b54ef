#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum ModeError {
    #[error("Unsupported transmission mode: {0}")]
    Unsupported(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum DeframeError {
    #[error("Soft block length mismatch: found {found}, expected {expected}")]
    BlockLength { found: usize, expected: usize },

    #[error("FIC symbol number out of range: {0} (expected 1..=3)")]
    SymbolNumber(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum FigError {
    #[error("FIG {fig_type} at byte {offset} declares {len} bytes, only {available} left in the FIB")]
    LengthOverrun {
        fig_type: u8,
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("FIG {fig_type}/{extension} ({len} bytes) truncated: {reason}")]
    Truncated {
        fig_type: u8,
        extension: u8,
        len: usize,
        reason: String,
    },

    #[error("Unsupported character set: {0}")]
    UnsupportedCharset(u8),

    #[error("FIG 0/6 id list uses a reserved qualifier (usage {0:#X})")]
    ReservedLinkQualifier(u8),

    #[error("{0} table is full")]
    TableFull(&'static str),

    #[error("FIB must be 30 or 32 bytes, got {0}")]
    FibLength(usize),
}
