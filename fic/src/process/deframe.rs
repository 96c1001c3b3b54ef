use log::trace;

use crate::structs::fig::FIB_BYTES;
use crate::utils::bits::pack_bits;
use crate::utils::crc::check_crc_bits;
use crate::utils::dispersal::{descramble, prbs};
use crate::utils::puncture::{FIC_MOTHER_BITS, FIC_PUNCTURED_BITS, PunctureTable};
use crate::utils::viterbi::ViterbiDecoder;

/// Decoded bits per code word: three FIBs.
pub const CODE_WORD_BITS: usize = 768;

/// FIBs per code word.
pub const FIBS_PER_CODE_WORD: usize = 3;

/// FIBs between two quality reports.
pub const QUALITY_WINDOW: u32 = 100;

const FIB_BITS: usize = FIB_BYTES * 8;

/// Output of the deframer, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deframed {
    /// A FIB with its CRC verdict. Failed FIBs are delivered for the raw
    /// tap only and must not be decoded.
    Fib { data: [u8; FIB_BYTES], crc_ok: bool },
    /// Percentage of FIBs that passed the CRC over the last
    /// [`QUALITY_WINDOW`] FIBs.
    Quality(u8),
}

/// Turns FIC soft bits into CRC-checked FIBs.
///
/// Soft values are signed confidences: positive for a 1, negative for a 0,
/// zero for no information. Every [`FIC_PUNCTURED_BITS`] values form a code
/// word that is de-punctured, Viterbi decoded and descrambled into three
/// FIBs.
#[derive(Debug)]
pub struct Deframer {
    puncture: PunctureTable,
    viterbi: ViterbiDecoder,
    prbs: Vec<u8>,

    input: Vec<i16>,
    mother: Vec<i16>,
    bits: Vec<u8>,

    /// Code words completed since the frame started.
    code_words: usize,
    window: QualityWindow,
}

/// CRC pass counter over blocks of [`QUALITY_WINDOW`] FIBs.
#[derive(Debug, Default, Clone, Copy)]
struct QualityWindow {
    total: u32,
    ok: u32,
}

impl QualityWindow {
    /// Counts a CRC verdict; every [`QUALITY_WINDOW`] FIBs returns the
    /// percentage that passed and starts a new window.
    fn record(&mut self, crc_ok: bool) -> Option<u8> {
        self.total += 1;
        if crc_ok {
            self.ok += 1;
        }

        if self.total < QUALITY_WINDOW {
            return None;
        }

        let quality = (self.ok * 100 / self.total) as u8;
        *self = Self::default();
        Some(quality)
    }
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    pub fn new() -> Self {
        let viterbi = ViterbiDecoder::new(CODE_WORD_BITS);
        debug_assert_eq!(viterbi.input_len(), FIC_MOTHER_BITS);

        Self {
            puncture: PunctureTable::fic(),
            viterbi,
            prbs: prbs(CODE_WORD_BITS),
            input: Vec::with_capacity(FIC_PUNCTURED_BITS),
            mother: vec![0; FIC_MOTHER_BITS],
            bits: vec![0; CODE_WORD_BITS],
            code_words: 0,
            window: QualityWindow::default(),
        }
    }

    /// Drops a partial code word and restarts the per-frame count. Called on
    /// the first FIC symbol of every frame.
    pub fn new_frame(&mut self) {
        if !self.input.is_empty() {
            trace!("Discarding {} soft bits of a partial code word", self.input.len());
        }
        self.input.clear();
        self.code_words = 0;
    }

    /// Code words completed in the current frame.
    pub fn code_words(&self) -> usize {
        self.code_words
    }

    /// Soft bits waiting for the next code word.
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Appends soft bits, decoding every completed code word.
    pub fn push(&mut self, soft: &[i16]) -> Vec<Deframed> {
        let mut out = Vec::new();
        let mut rest = soft;

        while !rest.is_empty() {
            let take = (FIC_PUNCTURED_BITS - self.input.len()).min(rest.len());
            self.input.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.input.len() == FIC_PUNCTURED_BITS {
                self.decode_code_word(&mut out);
                self.input.clear();
                self.code_words += 1;
            }
        }

        out
    }

    fn decode_code_word(&mut self, out: &mut Vec<Deframed>) {
        self.puncture.depuncture(&self.input, &mut self.mother);
        self.viterbi.decode(&self.mother, &mut self.bits);
        descramble(&mut self.bits, &self.prbs);

        for fib_bits in self.bits.chunks_exact(FIB_BITS) {
            let crc_ok = check_crc_bits(fib_bits);

            let mut data = [0u8; FIB_BYTES];
            data.copy_from_slice(&pack_bits(fib_bits));
            out.push(Deframed::Fib { data, crc_ok });

            if let Some(quality) = self.window.record(crc_ok) {
                out.push(Deframed::Quality(quality));
            }
        }
    }

    /// Counts the CRC verdict of a FIB that did not come through
    /// [`push`](Self::push).
    pub(crate) fn record(&mut self, crc_ok: bool) -> Option<u8> {
        self.window.record(crc_ok)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::bits::unpack_bytes;
    use crate::utils::crc::seal_crc;
    use crate::utils::viterbi::encode;

    pub(crate) fn sealed_fib(seed: u8) -> [u8; FIB_BYTES] {
        let mut fib = [0u8; FIB_BYTES];
        for (i, byte) in fib.iter_mut().enumerate() {
            *byte = seed.wrapping_mul(31).wrapping_add(i as u8 * 7);
        }
        seal_crc(&mut fib);
        fib
    }

    /// Channel-encodes three FIBs into the soft bits of one code word.
    pub(crate) fn transmit(fibs: &[[u8; FIB_BYTES]; 3]) -> Vec<i16> {
        let mut bits: Vec<u8> = fibs.iter().flat_map(|fib| unpack_bytes(fib)).collect();
        descramble(&mut bits, &prbs(CODE_WORD_BITS));

        PunctureTable::fic()
            .puncture(&encode(&bits))
            .into_iter()
            .map(|b| if b == 1 { 100 } else { -100 })
            .collect()
    }

    fn fibs(out: &[Deframed]) -> Vec<([u8; FIB_BYTES], bool)> {
        out.iter()
            .filter_map(|d| match d {
                Deframed::Fib { data, crc_ok } => Some((*data, *crc_ok)),
                Deframed::Quality(_) => None,
            })
            .collect()
    }

    #[test]
    fn code_word_round_trip() {
        let sent = [sealed_fib(1), sealed_fib(2), sealed_fib(3)];
        let soft = transmit(&sent);
        assert_eq!(soft.len(), FIC_PUNCTURED_BITS);

        let mut deframer = Deframer::new();
        let out = deframer.push(&soft);

        let received = fibs(&out);
        assert_eq!(received.len(), 3);
        for ((data, crc_ok), fib) in received.iter().zip(sent.iter()) {
            assert!(crc_ok);
            assert_eq!(data, fib);
        }
        assert_eq!(deframer.code_words(), 1);
        assert_eq!(deframer.pending(), 0);
    }

    #[test]
    fn symbols_split_code_words() {
        // mode II: 768 soft bits per symbol, three symbols per code word
        let soft = transmit(&[sealed_fib(4), sealed_fib(5), sealed_fib(6)]);
        let mut deframer = Deframer::new();

        assert!(deframer.push(&soft[..768]).is_empty());
        assert!(deframer.push(&soft[768..1536]).is_empty());
        assert_eq!(deframer.pending(), 1536);
        assert_eq!(fibs(&deframer.push(&soft[1536..])).len(), 3);

        // a frame start drops the partial word
        deframer.push(&soft[..1000]);
        deframer.new_frame();
        assert_eq!(deframer.pending(), 0);
        assert_eq!(deframer.code_words(), 0);
        assert!(fibs(&deframer.push(&soft)).iter().all(|(_, ok)| *ok));
    }

    #[test]
    fn corrupted_fib_fails_crc() {
        let mut bad = sealed_fib(7);
        bad[3] ^= 0x10;
        let sent = [sealed_fib(8), bad, sealed_fib(9)];

        let out = Deframer::new().push(&transmit(&sent));
        let verdicts: Vec<bool> = fibs(&out).iter().map(|(_, ok)| *ok).collect();

        assert_eq!(verdicts, vec![true, false, true]);
    }

    #[test]
    fn quality_window_restarts() {
        let mut window = QualityWindow::default();
        let reports: Vec<(usize, u8)> = (0..250)
            .filter_map(|i| window.record(i % 4 != 0).map(|q| (i, q)))
            .collect();

        assert_eq!(reports, vec![(99, 75), (199, 75)]);
        assert_eq!(window.total, 50);
    }

    #[test]
    fn quality_every_hundred_fibs() {
        let mut bad = sealed_fib(10);
        bad[0] ^= 1;
        let soft = transmit(&[sealed_fib(11), bad, sealed_fib(12)]);

        let mut deframer = Deframer::new();
        let mut reports = Vec::new();
        let mut fib_count = 0;
        for _ in 0..34 {
            for d in deframer.push(&soft) {
                match d {
                    Deframed::Fib { .. } => fib_count += 1,
                    Deframed::Quality(q) => reports.push((fib_count, q)),
                }
            }
        }

        // 100 FIBs: 33 full code words plus the first FIB of the 34th,
        // 67 of them good
        assert_eq!(reports, vec![(100, 67)]);
    }
}
