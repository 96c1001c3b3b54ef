//! Rate 1/4 mother convolutional code (constraint length 7).
//!
//! Generators, in output order: 133, 171, 145, 133 (octal). The register
//! holds the current input bit at bit 6 and the six previous bits below it,
//! newest first. Encoding is flushed with six zero tail bits, so decoding
//! always terminates in state 0.
//!
//! Soft values follow one convention throughout the crate: positive means
//! a transmitted 1, negative a transmitted 0, zero an erased (punctured) bit.

/// Generator polynomials in output order.
pub const GENERATORS: [u8; 4] = [0o133, 0o171, 0o145, 0o133];

/// Constraint length.
pub const K: usize = 7;

/// Number of tail bits flushing the register.
pub const TAIL_BITS: usize = K - 1;

const NUM_STATES: usize = 1 << (K - 1);
const STATE_MASK: usize = NUM_STATES - 1;

#[inline(always)]
const fn parity(value: u8) -> u8 {
    (value.count_ones() & 1) as u8
}

const fn output_table() -> [[u8; 4]; 1 << K] {
    let mut table = [[0u8; 4]; 1 << K];
    let mut reg = 0;
    while reg < table.len() {
        let mut k = 0;
        while k < GENERATORS.len() {
            table[reg][k] = parity(reg as u8 & GENERATORS[k]);
            k += 1;
        }
        reg += 1;
    }

    table
}

/// Encoder output symbols indexed by the 7-bit register.
const OUTPUTS: [[u8; 4]; 1 << K] = output_table();

/// Encodes `bits` (one bit per byte) and appends the tail, producing
/// `4 * (bits.len() + 6)` coded bits.
pub fn encode(bits: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 * (bits.len() + TAIL_BITS));
    let mut state = 0usize;

    for &bit in bits.iter().chain([0u8; TAIL_BITS].iter()) {
        let reg = ((bit as usize & 1) << (K - 1)) | state;
        out.extend_from_slice(&OUTPUTS[reg]);
        state = reg >> 1;
    }

    out
}

/// Maximum-likelihood decoder for a terminated block of `num_bits` bits.
#[derive(Debug)]
pub struct ViterbiDecoder {
    num_bits: usize,
    metrics: [i32; NUM_STATES],
    next_metrics: [i32; NUM_STATES],
    decisions: Vec<u64>,
}

impl ViterbiDecoder {
    pub fn new(num_bits: usize) -> Self {
        Self {
            num_bits,
            metrics: [0; NUM_STATES],
            next_metrics: [0; NUM_STATES],
            decisions: vec![0; num_bits + TAIL_BITS],
        }
    }

    /// Number of soft values consumed by [`Self::decode`].
    pub fn input_len(&self) -> usize {
        4 * (self.num_bits + TAIL_BITS)
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Decodes `soft` (length [`Self::input_len`]) into `out` (length
    /// [`Self::num_bits`], one bit per byte).
    pub fn decode(&mut self, soft: &[i16], out: &mut [u8]) {
        debug_assert_eq!(soft.len(), self.input_len());
        debug_assert_eq!(out.len(), self.num_bits);

        self.metrics = [i32::MIN / 2; NUM_STATES];
        self.metrics[0] = 0;

        for (step, symbol) in soft.chunks_exact(4).enumerate() {
            let mut decision = 0u64;
            let mut best = i32::MIN;

            for next in 0..NUM_STATES {
                // next = reg >> 1, so the register is next << 1 plus the bit
                // that drops out; both candidates share the new input bit
                let reg0 = next << 1;
                let reg1 = reg0 | 1;

                let m0 = self.metrics[reg0 & STATE_MASK] + branch_metric(&OUTPUTS[reg0], symbol);
                let m1 = self.metrics[reg1 & STATE_MASK] + branch_metric(&OUTPUTS[reg1], symbol);

                self.next_metrics[next] = if m1 > m0 {
                    decision |= 1u64 << next;
                    m1
                } else {
                    m0
                };
                best = best.max(self.next_metrics[next]);
            }

            for (metric, next) in self.metrics.iter_mut().zip(self.next_metrics.iter()) {
                *metric = next - best;
            }
            self.decisions[step] = decision;
        }

        let mut state = 0usize;
        for step in (0..self.decisions.len()).rev() {
            let bit = (state >> (K - 2)) as u8;
            if step < out.len() {
                out[step] = bit;
            }

            let dropped = ((self.decisions[step] >> state) & 1) as usize;
            state = ((state << 1) & STATE_MASK) | dropped;
        }
    }
}

#[inline(always)]
fn branch_metric(expected: &[u8; 4], symbol: &[i16]) -> i32 {
    expected
        .iter()
        .zip(symbol)
        .map(|(&e, &s)| if e == 1 { s as i32 } else { -(s as i32) })
        .sum()
}
