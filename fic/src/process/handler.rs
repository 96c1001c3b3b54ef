use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::{debug, trace};

use crate::process::decode::FibDecoder;
use crate::process::deframe::{Deframed, Deframer};
use crate::process::{DecodeErrorKind, FicEvent, TransmissionMode};
use crate::structs::fig::FIB_BYTES;
use crate::structs::label::Label;
use crate::utils::crc::check_crc_bytes;
use crate::utils::errors::DeframeError;

#[derive(Default)]
struct Callbacks {
    ensemble: Option<Box<dyn FnMut(u32, &Label) + Send>>,
    ensemble_id: Option<Box<dyn FnMut(u32) + Send>>,
    service: Option<Box<dyn FnMut(u32, &Label) + Send>>,
    quality: Option<Box<dyn FnMut(u8) + Send>>,
    fib: Option<Box<dyn FnMut(&[u8; FIB_BYTES], bool) + Send>>,
    decode_error: Option<Box<dyn FnMut(DecodeErrorKind) + Send>>,
    country: Option<Box<dyn FnMut(u8, u8) + Send>>,
    link_info: Option<Box<dyn FnMut(u32, &str, &str) + Send>>,
}

/// Producer-side entry point: soft bits in, notifications out.
///
/// The handler owns the [`Deframer`] and shares the [`FibDecoder`] through an
/// [`Arc`] so that other threads, and the callbacks themselves, can query
/// the ensemble. Callbacks run on the thread calling
/// [`process_block`](Self::process_block) and never with the decoder lock
/// held.
pub struct FicHandler {
    mode: TransmissionMode,
    deframer: Deframer,
    decoder: Arc<FibDecoder>,
    callbacks: Callbacks,
}

impl fmt::Debug for FicHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FicHandler")
            .field("mode", &self.mode)
            .field("deframer", &self.deframer)
            .finish_non_exhaustive()
    }
}

impl FicHandler {
    pub fn new(mode: TransmissionMode) -> Self {
        Self {
            mode,
            deframer: Deframer::new(),
            decoder: Arc::new(FibDecoder::new()),
            callbacks: Callbacks::default(),
        }
    }

    pub fn mode(&self) -> TransmissionMode {
        self.mode
    }

    /// Shared handle to the decoder for queries.
    pub fn decoder(&self) -> Arc<FibDecoder> {
        Arc::clone(&self.decoder)
    }

    /// Ensemble label and id, once per sync.
    pub fn on_ensemble(&mut self, f: impl FnMut(u32, &Label) + Send + 'static) -> &mut Self {
        self.callbacks.ensemble = Some(Box::new(f));
        self
    }

    /// Ensemble id from FIG 0/0, once per sync.
    pub fn on_ensemble_id(&mut self, f: impl FnMut(u32) + Send + 'static) -> &mut Self {
        self.callbacks.ensemble_id = Some(Box::new(f));
        self
    }

    /// Each service once, when it becomes visible.
    pub fn on_service(&mut self, f: impl FnMut(u32, &Label) + Send + 'static) -> &mut Self {
        self.callbacks.service = Some(Box::new(f));
        self
    }

    /// CRC pass percentage every 100 FIBs.
    pub fn on_quality(&mut self, f: impl FnMut(u8) + Send + 'static) -> &mut Self {
        self.callbacks.quality = Some(Box::new(f));
        self
    }

    /// Every deframed FIB with its CRC verdict.
    pub fn on_fib(
        &mut self,
        f: impl FnMut(&[u8; FIB_BYTES], bool) + Send + 'static,
    ) -> &mut Self {
        self.callbacks.fib = Some(Box::new(f));
        self
    }

    pub fn on_decode_error(
        &mut self,
        f: impl FnMut(DecodeErrorKind) + Send + 'static,
    ) -> &mut Self {
        self.callbacks.decode_error = Some(Box::new(f));
        self
    }

    /// Extended country code and international table id.
    pub fn on_country(&mut self, f: impl FnMut(u8, u8) + Send + 'static) -> &mut Self {
        self.callbacks.country = Some(Box::new(f));
        self
    }

    /// Sequence number, header and body of a service linking rendering not
    /// seen recently.
    pub fn on_link_info(
        &mut self,
        f: impl FnMut(u32, &str, &str) + Send + 'static,
    ) -> &mut Self {
        self.callbacks.link_info = Some(Box::new(f));
        self
    }

    /// See [`FibDecoder::set_fail_level`].
    pub fn set_fail_level(&self, level: log::Level) {
        self.decoder.set_fail_level(level);
    }

    /// Feeds FIC symbol `symbol` (1..=3) of a frame. Symbol 1 starts a new
    /// frame.
    pub fn process_block(&mut self, soft: &[i16], symbol: u8) -> Result<()> {
        if !(1..=self.mode.fic_symbols()).contains(&symbol) {
            bail!(DeframeError::SymbolNumber(symbol));
        }

        let expected = self.mode.soft_bits_per_symbol();
        if soft.len() != expected {
            bail!(DeframeError::BlockLength {
                found: soft.len(),
                expected,
            });
        }

        if symbol == 1 {
            self.deframer.new_frame();
            self.decoder.new_frame();
        }

        for output in self.deframer.push(soft) {
            match output {
                Deframed::Fib { data, crc_ok } => self.deliver(&data, crc_ok),
                Deframed::Quality(quality) => {
                    trace!("FIC quality {quality}%");
                    if let Some(f) = self.callbacks.quality.as_mut() {
                        f(quality);
                    }
                }
            }
        }

        Ok(())
    }

    /// Feeds an already deframed FIB, as read from a capture. The CRC is
    /// checked here; returns whether it passed.
    pub fn push_fib(&mut self, fib: &[u8; FIB_BYTES]) -> bool {
        let crc_ok = check_crc_bytes(fib);
        self.deliver(fib, crc_ok);

        if let Some(quality) = self.deframer.record(crc_ok) {
            if let Some(f) = self.callbacks.quality.as_mut() {
                f(quality);
            }
        }

        crc_ok
    }

    /// Forgets the ensemble and any partial code word.
    pub fn reset(&mut self) {
        self.deframer.new_frame();
        self.decoder.reset();
        debug!("FIC handler reset ({})", self.mode);
    }

    fn deliver(&mut self, data: &[u8; FIB_BYTES], crc_ok: bool) {
        if let Some(f) = self.callbacks.fib.as_mut() {
            f(data, crc_ok);
        }

        if !crc_ok {
            if let Some(f) = self.callbacks.decode_error.as_mut() {
                f(DecodeErrorKind::FibCrc);
            }
            return;
        }

        for event in self.decoder.process_fib(data) {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: FicEvent) {
        let callbacks = &mut self.callbacks;

        match event {
            FicEvent::EnsembleId(id) => {
                if let Some(f) = callbacks.ensemble_id.as_mut() {
                    f(id);
                }
            }
            FicEvent::EnsembleName { id, label } => {
                if let Some(f) = callbacks.ensemble.as_mut() {
                    f(id, &label);
                }
            }
            FicEvent::Service { id, label } => {
                if let Some(f) = callbacks.service.as_mut() {
                    f(id, &label);
                }
            }
            FicEvent::Country {
                ecc,
                inter_table_id,
            } => {
                if let Some(f) = callbacks.country.as_mut() {
                    f(ecc, inter_table_id);
                }
            }
            FicEvent::LinkInfo {
                sequence,
                header,
                body,
            } => {
                if let Some(f) = callbacks.link_info.as_mut() {
                    f(sequence, &header, &body);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::process::deframe::tests::transmit;
    use crate::process::fixtures::{FigWriter, fib, fig0, fig1, label_field};
    use crate::process::query::AudioData;

    fn mode_two_frame() -> Vec<i16> {
        let org = FigWriter::new()
            .bits(16, 0x1234)
            .bits(4, 0)
            .bits(4, 1)
            .bits(2, 0)
            .bits(6, 0)
            .bits(6, 5)
            .flag(true)
            .flag(false)
            .finish();
        let sub = FigWriter::new()
            .bits(6, 5)
            .bits(10, 0)
            .flag(false)
            .flag(false)
            .bits(6, 3)
            .finish();

        let mut service = 0x1234u16.to_be_bytes().to_vec();
        service.extend(label_field("Test FM", 0));
        let mut ensemble = 0xC0FEu16.to_be_bytes().to_vec();
        ensemble.extend(label_field("Test Mux", 0));

        transmit(&[
            fib(&[fig0(false, false, false, 2, &org), fig0(false, false, false, 1, &sub)]),
            fib(&[fig1(0, 1, &service)]),
            fib(&[fig1(0, 0, &ensemble)]),
        ])
    }

    #[test]
    fn callbacks_may_query_decoder() {
        let mut handler = FicHandler::new(TransmissionMode::II);
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let found: Arc<Mutex<Option<AudioData>>> = Arc::default();

        let decoder = handler.decoder();
        let (s, f) = (seen.clone(), found.clone());
        handler.on_service(move |id, label| {
            s.lock().unwrap().push(label.text.trim_end().to_string());
            *f.lock().unwrap() = decoder.audio_data_by_id(id, 0);
        });
        let s = seen.clone();
        handler.on_ensemble(move |id, label| {
            s.lock().unwrap().push(format!("{id:04X} {}", label.text.trim_end()));
        });

        let soft = mode_two_frame();
        for (i, symbol) in soft.chunks(768).enumerate() {
            handler.process_block(symbol, i as u8 + 1).unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), vec!["Test FM", "C0FE Test Mux"]);
        let audio = found.lock().unwrap().clone().unwrap();
        assert_eq!(audio.sub_ch_id, 5);
        assert_eq!(audio.subchannel.unwrap().bit_rate, Some(32));
    }

    #[test]
    fn fib_tap_and_crc_errors() {
        let mut handler = FicHandler::new(TransmissionMode::II);
        let verdicts: Arc<Mutex<Vec<bool>>> = Arc::default();
        let errors: Arc<Mutex<Vec<DecodeErrorKind>>> = Arc::default();

        let v = verdicts.clone();
        handler.on_fib(move |_, ok| v.lock().unwrap().push(ok));
        let e = errors.clone();
        handler.on_decode_error(move |kind| e.lock().unwrap().push(kind));

        let mut good = fib(&[]);
        assert!(handler.push_fib(&good));
        good[5] ^= 0x80;
        assert!(!handler.push_fib(&good));

        assert_eq!(*verdicts.lock().unwrap(), vec![true, false]);
        assert_eq!(*errors.lock().unwrap(), vec![DecodeErrorKind::FibCrc]);
    }

    #[test]
    fn block_validation() {
        let mut handler = FicHandler::new(TransmissionMode::IV);
        let block = vec![0i16; TransmissionMode::IV.soft_bits_per_symbol()];

        let err = handler.process_block(&block, 4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeframeError>(),
            Some(DeframeError::SymbolNumber(4))
        ));

        let err = handler.process_block(&block[1..], 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeframeError>(),
            Some(DeframeError::BlockLength {
                found: 1535,
                expected: 1536
            })
        ));

        handler.process_block(&block, 1).unwrap();
    }

    #[test]
    fn frame_start_advances_cif() {
        let mut handler = FicHandler::new(TransmissionMode::IV);
        let block = vec![0i16; TransmissionMode::IV.soft_bits_per_symbol()];
        let decoder = handler.decoder();

        decoder.process_fib(&fib(&[fig0(false, false, false, 0, &[0xC0, 0xFE, 0x00, 0x09])]));
        assert_eq!(decoder.cif_count(), Some(9));

        // less than a code word: nothing is decoded, only the frame counts
        handler.process_block(&block, 1).unwrap();
        assert_eq!(decoder.cif_count(), Some(10));
        handler.process_block(&block, 1).unwrap();
        assert_eq!(decoder.cif_count(), Some(11));

        handler.reset();
        assert_eq!(decoder.cif_count(), None);
    }
}
