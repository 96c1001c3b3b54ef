use std::io::Write;

use anyhow::Result;
use env_logger::fmt::Formatter;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::Record;

use super::command::{Cli, LogFormat};

/// Installs the global logger. With `--progress` log lines are routed
/// through `multi` so they do not tear the progress bars.
pub fn init(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            builder.format(json_record);
        }
    }

    if cli.progress {
        LogWrapper::new(multi.clone(), builder.build()).try_init()?;
    } else {
        builder.try_init()?;
    }

    Ok(())
}

/// One JSON object per record. The message is escaped by `{:?}`, which
/// agrees with JSON for the text the decoder logs.
fn json_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "{{\"ts\":\"{}\",\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
        buf.timestamp(),
        record.level(),
        record.target(),
        record.args().to_string()
    )
}
