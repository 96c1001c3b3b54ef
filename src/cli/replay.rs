use std::sync::Arc;

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, ReplayArgs};
use super::progress::create_progress_bar;
use super::report::{EnsembleReport, Statistics};
use crate::input::{InputReader, RecordBuffer};
use fic::process::decode::FibDecoder;
use fic::process::handler::FicHandler;
use fic::process::{ServiceKind, TransmissionMode};
use fic::structs::fig::FIB_BYTES;

pub fn cmd_replay(args: &ReplayArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Replaying FIB capture: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(
            multi,
            input_reader.records(FIB_BYTES),
            "FIBs",
        )?),
        None => None,
    };

    let mut replay = Replay::new(cli.fail_level(), args.flush_every, pb.clone());
    let mut records = RecordBuffer::new(FIB_BYTES);

    input_reader.process_chunks(64 * 1024, |chunk| {
        records.push(chunk, |record| replay.push(record))?;
        if let Some(pb) = &pb {
            pb.set_position(replay.statistics.fibs);
        }
        Ok(true)
    })?;

    if records.pending() > 0 {
        log::warn!("Ignoring {} trailing bytes", records.pending());
    }
    if let Some(pb) = &pb {
        pb.finish_with_message("done");
    }

    let statistics = replay.finish();
    log::info!(
        "Replay complete: {} FIBs, {} CRC errors",
        statistics.fibs,
        statistics.crc_errors
    );

    EnsembleReport::from_decoder(&replay.decoder, statistics).write(args.report.as_deref())
}

/// Feeds captured FIBs through a [`FicHandler`] and keeps the tallies for
/// the report.
pub struct Replay {
    handler: FicHandler,
    decoder: Arc<FibDecoder>,
    flush_every: u64,
    statistics: Statistics,
}

impl Replay {
    pub fn new(fail_level: log::Level, flush_every: u64, pb: Option<ProgressBar>) -> Self {
        // the mode only matters for soft bit input
        let mut handler = FicHandler::new(TransmissionMode::I);
        handler.set_fail_level(fail_level);
        let decoder = handler.decoder();

        let query = Arc::clone(&decoder);
        handler
            .on_ensemble(move |id, label| {
                if let Some(pb) = &pb {
                    pb.set_message(format!("0x{id:04X} {}", label.text.trim_end()));
                }
            })
            .on_service(move |id, _| log_service(&query, id))
            .on_country(|ecc, table| {
                log::info!("Extended country code 0x{ecc:02X}, international table {table}");
            })
            .on_link_info(|sequence, header, body| {
                log::info!("Service linking #{sequence}: {header}\n{body}");
            });

        Self {
            handler,
            decoder,
            flush_every,
            statistics: Statistics::default(),
        }
    }

    /// Decodes one 32-byte record.
    pub fn push(&mut self, record: &[u8]) -> Result<()> {
        let Ok(fib) = <&[u8; FIB_BYTES]>::try_from(record) else {
            bail!("FIB record must be {FIB_BYTES} bytes, got {}", record.len());
        };

        self.statistics.fibs += 1;
        if !self.handler.push_fib(fib) {
            self.statistics.crc_errors += 1;
            log::debug!("CRC error in FIB {}", self.statistics.fibs);
        }

        if self.flush_every > 0 && self.statistics.fibs % self.flush_every == 0 {
            self.flush_links();
        }

        Ok(())
    }

    fn flush_links(&self) {
        for link in self.decoder.flush_service_links() {
            log::info!("Linkage set\n{link}");
        }
    }

    pub fn finish(&mut self) -> Statistics {
        std::mem::take(&mut self.statistics)
    }
}

/// Logs a newly visible service with its primary component. Runs inside a
/// handler callback, so it goes through the query accessors.
pub(crate) fn log_service(decoder: &FibDecoder, id: u32) {
    let name = decoder.name_for(id).unwrap_or_default();

    match decoder.kind_of_service_id(id) {
        ServiceKind::Audio => match decoder.audio_data_by_id(id, 0) {
            Some(audio) => log::debug!(
                "0x{id:04X} {}: audio on subchannel {} ({} kbit/s)",
                name.trim_end(),
                audio.sub_ch_id,
                audio
                    .subchannel
                    .and_then(|s| s.bit_rate)
                    .map_or_else(|| "?".to_string(), |rate| rate.to_string())
            ),
            None => log::debug!("0x{id:04X} {}: audio", name.trim_end()),
        },
        ServiceKind::Packet => match decoder.packet_data_by_id(id, 0) {
            Some(packet) => log::debug!(
                "0x{id:04X} {}: packet data, SCId {}, address {}",
                name.trim_end(),
                packet.sc_id,
                packet.packet_address
            ),
            None => log::debug!("0x{id:04X} {}: packet data", name.trim_end()),
        },
        ServiceKind::Unknown => log::debug!("0x{id:04X} {}: data service", name.trim_end()),
    }
}
