//! CRC-16 validation for Fast Information Blocks.
//!
//! A FIB carries 240 data bits followed by a 16-bit check word. The check
//! word is the one's complement of the CCITT CRC (generator
//! x^16 + x^12 + x^5 + 1, register preset to all ones) over the data bits.
//!
//! Three paths are provided and agree on every input:
//!
//! - [`Crc16`]: MSB-first, table driven, on packed bytes. Used to validate
//!   stored FIB records and to seal generated ones.
//! - [`check_crc_bits`] on unpacked bits of any length, one bit at a time
//!   through the reflected register.
//! - the byte-aligned fast path of [`check_crc_bits`], taken when the length
//!   is a multiple of 8, feeding bit-reversed bytes through a reflected lookup
//!   table.
//!
//! On the bit paths the trailer is inverted while it is shifted in; a zero
//! residual signals success.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16-CCITT as used by the FIB check word.
pub const CRC_FIB_ALG: Algorithm<u16> = Algorithm {
    poly: 0x1021,
    init: 0xFFFF,
};

/// Shifts `len` zero bits through an MSB-first CRC-16 register.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

/// Shifts `len` zero bits through a reflected (LSB-first) CRC-16 register.
#[inline(always)]
const fn crc16_reflected(poly: u16, mut value: u16, len: usize) -> u16 {
    let mut i = 0;
    while i < len {
        value = (value >> 1) ^ ((value & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, (i as u16) << 8, 8);
        i += 1;
    }

    table
}

#[inline(always)]
const fn crc16_reflected_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16_reflected(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[inline(always)]
const fn bit_reverse_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }

    table
}

const REFLECTED_POLY: u16 = CRC_FIB_ALG.poly.reverse_bits();
const REFLECTED_TABLE: [u16; 256] = crc16_reflected_table(REFLECTED_POLY);
const BIT_REVERSE: [u8; 256] = bit_reverse_table();

static FIB_CRC: Crc16 = Crc16::new(&CRC_FIB_ALG);

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8);
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

/// Validates packed bytes whose last two bytes hold the inverted check word.
pub fn check_crc_bytes(msg: &[u8]) -> bool {
    let Some(data_len) = msg.len().checked_sub(2) else {
        return false;
    };

    let trailer = u16::from_be_bytes([msg[data_len], msg[data_len + 1]]);

    FIB_CRC.checksum(&msg[..data_len]) == !trailer
}

/// Writes the inverted check word over the last two bytes of `msg`.
pub fn seal_crc(msg: &mut [u8]) {
    let Some(data_len) = msg.len().checked_sub(2) else {
        return;
    };

    let crc = !FIB_CRC.checksum(&msg[..data_len]);
    msg[data_len..].copy_from_slice(&crc.to_be_bytes());
}

/// Validates a block of unpacked bits (one bit per byte) whose last 16 bits
/// hold the inverted check word.
pub fn check_crc_bits(bits: &[u8]) -> bool {
    if bits.len() < 16 {
        return false;
    }

    if bits.len() % 8 == 0 {
        check_crc_bits_aligned(bits)
    } else {
        check_crc_bits_serial(bits)
    }
}

pub(crate) fn check_crc_bits_serial(bits: &[u8]) -> bool {
    let trailer_start = bits.len() - 16;
    let mut b: u16 = CRC_FIB_ALG.init;

    for (i, bit) in bits.iter().enumerate() {
        let mut bit = (bit & 1) as u16;
        if i >= trailer_start {
            bit ^= 1;
        }

        b = if (b ^ bit) & 1 != 0 {
            (b >> 1) ^ REFLECTED_POLY
        } else {
            b >> 1
        };
    }

    b == 0
}

pub(crate) fn check_crc_bits_aligned(bits: &[u8]) -> bool {
    let trailer_start = (bits.len() - 16) / 8;
    let mut b: u16 = CRC_FIB_ALG.init;

    for (i, chunk) in bits.chunks_exact(8).enumerate() {
        let mut byte = chunk.iter().fold(0u8, |acc, bit| (acc << 1) | (bit & 1));
        if i >= trailer_start {
            byte = !byte;
        }

        let data = BIT_REVERSE[byte as usize];
        b = REFLECTED_TABLE[((b ^ data as u16) & 0xFF) as usize] ^ (b >> 8);
    }

    b == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bits::unpack_bytes;

    fn sealed_fib() -> [u8; 32] {
        let mut fib = [0u8; 32];
        for (i, byte) in fib.iter_mut().take(30).enumerate() {
            *byte = (i as u8).wrapping_mul(37) ^ 0x5A;
        }
        seal_crc(&mut fib);
        fib
    }

    #[test]
    fn ccitt_check_value() {
        // CRC-16/CCITT-FALSE of "123456789"
        assert_eq!(FIB_CRC.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn sealed_block_passes_every_path() {
        let fib = sealed_fib();
        let bits = unpack_bytes(&fib);

        assert!(check_crc_bytes(&fib));
        assert!(check_crc_bits_serial(&bits));
        assert!(check_crc_bits_aligned(&bits));
        assert!(check_crc_bits(&bits));
    }

    #[test]
    fn single_bit_flip_fails() {
        let fib = sealed_fib();
        let bits = unpack_bytes(&fib);

        for pos in 0..bits.len() {
            let mut corrupted = bits.clone();
            corrupted[pos] ^= 1;

            assert!(!check_crc_bits_serial(&corrupted), "serial, bit {pos}");
            assert!(!check_crc_bits_aligned(&corrupted), "aligned, bit {pos}");
        }

        for pos in 0..fib.len() * 8 {
            let mut corrupted = fib;
            corrupted[pos / 8] ^= 0x80 >> (pos % 8);

            assert!(!check_crc_bytes(&corrupted), "bytes, bit {pos}");
        }
    }

    #[test]
    fn paths_agree_on_arbitrary_blocks() {
        let mut x = 0x1234_5678u32;
        for _ in 0..200 {
            let bits: Vec<u8> = (0..256)
                .map(|_| {
                    x ^= x << 13;
                    x ^= x >> 17;
                    x ^= x << 5;
                    (x & 1) as u8
                })
                .collect();

            assert_eq!(check_crc_bits_serial(&bits), check_crc_bits_aligned(&bits));
        }
    }

    #[test]
    fn unaligned_length_uses_serial_path() {
        // 5 data bits + 16 trailer bits
        let data = [1u8, 0, 1, 1, 0];
        let mut b: u16 = 0xFFFF;
        for bit in data {
            b = if (b ^ bit as u16) & 1 != 0 {
                (b >> 1) ^ REFLECTED_POLY
            } else {
                b >> 1
            };
        }

        // the residual is cleared by feeding the register LSB first, then inverting
        let mut bits = data.to_vec();
        bits.extend((0..16).map(|i| (((b >> i) & 1) as u8) ^ 1));

        assert!(check_crc_bits(&bits));
        bits[2] ^= 1;
        assert!(!check_crc_bits(&bits));
    }
}
