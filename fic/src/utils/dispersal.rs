//! Energy dispersal sequence.
//!
//! PRBS from the generator x^9 + x^5 + 1 with the register preset to all
//! ones, as applied to the FIC after Viterbi decoding.

/// Generates the first `len` bits (one per byte) of the dispersal sequence.
pub fn prbs(len: usize) -> Vec<u8> {
    let mut reg = [1u8; 9];

    (0..len)
        .map(|_| {
            let bit = reg[8] ^ reg[4];
            reg.copy_within(0..8, 1);
            reg[0] = bit;
            bit
        })
        .collect()
}

/// XORs `bits` in place with the dispersal sequence `seq`.
#[inline(always)]
pub fn descramble(bits: &mut [u8], seq: &[u8]) {
    for (bit, s) in bits.iter_mut().zip(seq) {
        *bit ^= s;
    }
}

#[test]
fn prbs_starts_with_standard_prefix() {
    // EN 300 401 clause 10: the first 16 bits after preset
    let expected = [0, 0, 0, 0, 0, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 0];
    assert_eq!(prbs(16), expected);
}

#[test]
fn prbs_period_is_511() {
    let seq = prbs(1022);
    assert_eq!(seq[..511], seq[511..]);
    assert_ne!(seq[..255], seq[256..511]);
}
