use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::{Result, anyhow};
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, DecodeArgs};
use super::progress::create_progress_bar;
use super::replay::log_service;
use super::report::{EnsembleReport, Statistics};
use crate::input::InputReader;
use fic::process::handler::FicHandler;
use fic::process::{DecodeErrorKind, TransmissionMode};
use fic::structs::fig::FIB_BYTES;

/// Notifications forwarded from the decoder thread.
#[derive(Debug)]
enum Notice {
    Ensemble { id: u32, label: String },
    Service(u32),
    Quality(u8),
    Fib { data: [u8; FIB_BYTES], crc_ok: bool },
    DecodeError(DecodeErrorKind),
}

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding FIC soft bits: {} ({})",
        args.input.display(),
        args.mode
    );

    let input_reader = InputReader::new(&args.input)?;
    let symbol_bytes = 2 * args.mode.soft_bits_per_symbol();
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(
            multi,
            input_reader.records(symbol_bytes),
            "symbols",
        )?),
        None => None,
    };

    let mut fib_out = match &args.fib_out {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut handler = FicHandler::new(args.mode);
    handler.set_fail_level(cli.fail_level());
    let decoder = handler.decoder();

    let (tx, rx) = mpsc::channel();
    register_callbacks(&mut handler, &tx);
    drop(tx);

    let worker = spawn_decoder_thread(DecoderThreadConfig {
        input_reader,
        handler,
        pb: pb.clone(),
    });

    let mut statistics = Statistics::default();

    // Ends when the worker drops the handler and with it every sender
    for notice in rx {
        match notice {
            Notice::Ensemble { id, label } => {
                if let Some(pb) = &pb {
                    pb.set_message(format!("0x{id:04X} {label}"));
                }
            }
            Notice::Service(id) => log_service(&decoder, id),
            Notice::Quality(quality) => {
                log::debug!("FIC quality {quality}%");
                if quality < 50 {
                    log::warn!("Poor FIC reception: {quality}% of FIBs passed the CRC");
                }
            }
            Notice::Fib { data, crc_ok } => {
                statistics.fibs += 1;
                if let Some(out) = fib_out.as_mut() {
                    out.write_all(&data)?;
                }
                if !crc_ok {
                    log::trace!("FIB {} failed its CRC", statistics.fibs);
                }
            }
            Notice::DecodeError(DecodeErrorKind::FibCrc) => statistics.crc_errors += 1,
        }
    }

    let symbols = worker
        .join()
        .map_err(|_| anyhow!("Decoder thread panicked"))??;

    if let Some(mut out) = fib_out {
        out.flush()?;
    }
    if let Some(pb) = &pb {
        pb.finish_with_message("done");
    }

    log::info!(
        "Decoding complete: {symbols} symbols, {} FIBs, {} CRC errors",
        statistics.fibs,
        statistics.crc_errors
    );

    EnsembleReport::from_decoder(&decoder, statistics).write(args.report.as_deref())
}

fn register_callbacks(handler: &mut FicHandler, tx: &mpsc::Sender<Notice>) {
    // Sends fail only once the main thread has given up; nothing to do then
    let ensemble = tx.clone();
    let service = tx.clone();
    let quality = tx.clone();
    let decode_error = tx.clone();
    let fib = tx.clone();

    handler
        .on_ensemble(move |id, label| {
            let label = label.text.trim_end().to_string();
            let _ = ensemble.send(Notice::Ensemble { id, label });
        })
        .on_service(move |id, _| {
            let _ = service.send(Notice::Service(id));
        })
        .on_quality(move |q| {
            let _ = quality.send(Notice::Quality(q));
        })
        .on_decode_error(move |kind| {
            let _ = decode_error.send(Notice::DecodeError(kind));
        })
        .on_country(|ecc, table| {
            log::info!("Extended country code 0x{ecc:02X}, international table {table}");
        })
        .on_link_info(|sequence, header, body| {
            log::info!("Service linking #{sequence}: {header}\n{body}");
        })
        .on_fib(move |data, crc_ok| {
            let _ = fib.send(Notice::Fib {
                data: *data,
                crc_ok,
            });
        });
}

struct DecoderThreadConfig {
    input_reader: InputReader,
    handler: FicHandler,
    pb: Option<ProgressBar>,
}

fn spawn_decoder_thread(config: DecoderThreadConfig) -> thread::JoinHandle<Result<u64>> {
    thread::spawn(move || -> Result<u64> {
        let DecoderThreadConfig {
            mut input_reader,
            mut handler,
            pb,
        } = config;

        let mut symbols = SymbolAssembler::new(handler.mode());

        input_reader.process_chunks(64 * 1024, |chunk| {
            symbols.push(chunk, |soft, symbol| handler.process_block(soft, symbol))?;
            if let Some(pb) = &pb {
                pb.set_position(symbols.count());
            }
            Ok(true)
        })?;

        if symbols.pending() > 0 {
            log::warn!("Ignoring {} soft bits of a partial symbol", symbols.pending());
        }

        Ok(symbols.count())
    })
}

/// Slices a little-endian `i16` stream into FIC symbols and numbers them
/// 1..=3 within each frame.
struct SymbolAssembler {
    symbol_len: usize,
    fic_symbols: u8,
    odd_byte: Option<u8>,
    soft: Vec<i16>,
    count: u64,
}

impl SymbolAssembler {
    fn new(mode: TransmissionMode) -> Self {
        let symbol_len = mode.soft_bits_per_symbol();
        Self {
            symbol_len,
            fic_symbols: mode.fic_symbols(),
            odd_byte: None,
            soft: Vec::with_capacity(symbol_len),
            count: 0,
        }
    }

    fn push<F>(&mut self, mut bytes: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[i16], u8) -> Result<()>,
    {
        if let Some(low) = self.odd_byte.take() {
            let Some((&high, rest)) = bytes.split_first() else {
                self.odd_byte = Some(low);
                return Ok(());
            };
            self.append(i16::from_le_bytes([low, high]), &mut f)?;
            bytes = rest;
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in pairs.by_ref() {
            self.append(i16::from_le_bytes([pair[0], pair[1]]), &mut f)?;
        }
        self.odd_byte = pairs.remainder().first().copied();

        Ok(())
    }

    fn append<F>(&mut self, value: i16, f: &mut F) -> Result<()>
    where
        F: FnMut(&[i16], u8) -> Result<()>,
    {
        self.soft.push(value);
        if self.soft.len() == self.symbol_len {
            let symbol = (self.count % self.fic_symbols as u64) as u8 + 1;
            f(&self.soft, symbol)?;
            self.soft.clear();
            self.count += 1;
        }
        Ok(())
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn pending(&self) -> usize {
        self.soft.len()
    }
}
