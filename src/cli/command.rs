use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use fic::process::TransmissionMode;

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (fic ", env!("FIC_VERSION"), ", built ", env!("BUILD_TIMESTAMP"), ")"
    ),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for replaying and decoding the DAB Fast Information Channel",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (drop a FIB on its first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a capture of raw 32-byte FIBs.
    Replay(ReplayArgs),

    /// Decode FIC soft bits into FIBs and the ensemble description.
    Decode(DecodeArgs),
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Input FIB capture (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Flush the service linking sets every N FIBs (0 disables).
    #[arg(long, value_name = "N", default_value_t = 7200)]
    pub flush_every: u64,

    /// Write the YAML ensemble report here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Input soft bits as signed 16-bit little-endian values (use "-" for
    /// stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Transmission mode (1, 2 or 4).
    #[arg(long, value_name = "MODE", default_value = "1", value_parser = parse_mode)]
    pub mode: TransmissionMode,

    /// Also write every deframed FIB to this raw capture.
    #[arg(long, value_name = "PATH")]
    pub fib_out: Option<PathBuf>,

    /// Write the YAML ensemble report here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

fn parse_mode(value: &str) -> Result<TransmissionMode, String> {
    let mode: u8 = value
        .parse()
        .map_err(|_| format!("invalid mode number: {value}"))?;
    TransmissionMode::try_from(mode).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

impl Cli {
    /// Decoder fail level for `--strict`.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_defaults() {
        let cli = Cli::try_parse_from(["dabfic", "replay", "capture.fib"]).unwrap();
        let Commands::Replay(args) = &cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.input, PathBuf::from("capture.fib"));
        assert_eq!(args.flush_every, 7200);
        assert!(args.report.is_none());
        assert_eq!(cli.fail_level(), log::Level::Error);
    }

    #[test]
    fn decode_mode_and_globals() {
        let cli = Cli::try_parse_from([
            "dabfic", "decode", "-", "--mode", "2", "--fib-out", "out.fib", "--strict",
        ])
        .unwrap();
        let Commands::Decode(args) = &cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.mode, TransmissionMode::II);
        assert_eq!(args.fib_out, Some(PathBuf::from("out.fib")));
        assert_eq!(cli.fail_level(), log::Level::Warn);
    }

    #[test]
    fn mode_three_is_rejected() {
        assert!(Cli::try_parse_from(["dabfic", "decode", "in.raw", "--mode", "3"]).is_err());
        assert!(Cli::try_parse_from(["dabfic", "decode", "in.raw", "--mode", "x"]).is_err());

        let cli = Cli::try_parse_from(["dabfic", "decode", "in.raw"]).unwrap();
        let Commands::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.mode, TransmissionMode::I);
    }
}
