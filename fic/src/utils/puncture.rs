//! Puncturing vectors and the FIC de-puncturing pattern.
//!
//! A FIC code word of 3096 mother-code bits (768 data bits plus tail) is
//! punctured to 2304 transmitted bits: 21 blocks of 128 bits with PI_16,
//! 3 blocks of 128 bits with PI_15, then the 24 tail bits with PI_8.

/// Coded bits per FIC code word before puncturing.
pub const FIC_MOTHER_BITS: usize = 4 * 768 + 24;

/// Transmitted (punctured) bits per FIC code word.
pub const FIC_PUNCTURED_BITS: usize = 2304;

const fn repeat(nibble: [u8; 4], last: [u8; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 28 {
        out[i] = nibble[i % 4];
        i += 1;
    }
    while i < 32 {
        out[i] = last[i % 4];
        i += 1;
    }

    out
}

/// Puncturing vector PI_8 (rate 8/16).
pub const PI_8: [u8; 32] = repeat([1, 1, 0, 0], [1, 1, 0, 0]);

/// Puncturing vector PI_15 (rate 8/23).
pub const PI_15: [u8; 32] = repeat([1, 1, 1, 0], [1, 1, 0, 0]);

/// Puncturing vector PI_16 (rate 8/24).
pub const PI_16: [u8; 32] = repeat([1, 1, 1, 0], [1, 1, 1, 0]);

/// Keep/drop mask over the 3096 mother-code positions of a FIC code word.
#[derive(Debug, Clone)]
pub struct PunctureTable {
    keep: Vec<bool>,
}

impl PunctureTable {
    pub fn fic() -> Self {
        let mut keep = Vec::with_capacity(FIC_MOTHER_BITS);

        for _ in 0..21 {
            keep.extend((0..128).map(|k| PI_16[k % 32] == 1));
        }
        for _ in 0..3 {
            keep.extend((0..128).map(|k| PI_15[k % 32] == 1));
        }
        keep.extend(PI_8[..24].iter().map(|&p| p == 1));

        Self { keep }
    }

    pub fn mother_len(&self) -> usize {
        self.keep.len()
    }

    /// Number of transmitted positions.
    pub fn punctured_len(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Spreads `input` over the kept positions of `out`; dropped positions
    /// become erasures (0).
    pub fn depuncture(&self, input: &[i16], out: &mut [i16]) {
        let mut source = input.iter();
        for (slot, &keep) in out.iter_mut().zip(self.keep.iter()) {
            *slot = if keep {
                source.next().copied().unwrap_or(0)
            } else {
                0
            };
        }
    }

    /// Drops the punctured positions of a mother-code bit sequence.
    pub fn puncture<T: Copy>(&self, coded: &[T]) -> Vec<T> {
        coded
            .iter()
            .zip(self.keep.iter())
            .filter_map(|(&c, &keep)| keep.then_some(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_weights() {
        let weight = |v: &[u8; 32]| v.iter().filter(|&&b| b == 1).count();

        assert_eq!(weight(&PI_8), 16);
        assert_eq!(weight(&PI_15), 23);
        assert_eq!(weight(&PI_16), 24);
    }

    #[test]
    fn fic_table_sizes() {
        let table = PunctureTable::fic();

        assert_eq!(table.mother_len(), FIC_MOTHER_BITS);
        assert_eq!(table.punctured_len(), FIC_PUNCTURED_BITS);
    }

    #[test]
    fn depuncture_restores_positions() {
        let table = PunctureTable::fic();
        let coded: Vec<i16> = (0..FIC_MOTHER_BITS as i16).map(|i| i % 100 + 1).collect();

        let sent = table.puncture(&coded);
        let mut restored = vec![0i16; FIC_MOTHER_BITS];
        table.depuncture(&sent, &mut restored);

        for (i, (&r, &c)) in restored.iter().zip(coded.iter()).enumerate() {
            if table.keep[i] {
                assert_eq!(r, c);
            } else {
                assert_eq!(r, 0);
            }
        }
    }
}
