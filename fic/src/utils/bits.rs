//! Bit field extraction.
//!
//! Two buffer layouts are supported: byte-packed (MSB first, the layout of a
//! FIB on disk) and unpacked, one bit per byte (the layout the deframer works
//! on before packing). Both accessors return identical values for identical
//! bit sequences. Bits beyond the end of the buffer read as zero.

/// Reads `width` (1..=16) bits from a byte-packed buffer.
#[inline(always)]
fn packed_16(buf: &[u8], offset: usize, width: u32) -> u32 {
    let mut value = 0u32;
    for i in 0..width as usize {
        let pos = offset + i;
        let bit = buf.get(pos >> 3).map_or(0, |byte| (byte >> (7 - (pos & 7))) & 1);
        value = (value << 1) | bit as u32;
    }

    value
}

/// Reads `width` (1..=16) bits from a one-bit-per-byte buffer.
#[inline(always)]
fn unpacked_16(bits: &[u8], offset: usize, width: u32) -> u32 {
    let mut value = 0u32;
    for i in 0..width as usize {
        let bit = bits.get(offset + i).map_or(0, |b| b & 1);
        value = (value << 1) | bit as u32;
    }

    value
}

#[inline(always)]
fn compose(
    buf: &[u8],
    offset: usize,
    width: u32,
    read16: fn(&[u8], usize, u32) -> u32,
) -> u32 {
    debug_assert!((1..=32).contains(&width));

    if width <= 16 {
        return read16(buf, offset, width);
    }

    let hi = read16(buf, offset, width - 16);
    let lo = read16(buf, offset + (width - 16) as usize, 16);

    (hi << 16) | lo
}

/// Extracts an unsigned value of `width` (1..=32) bits starting at bit
/// `offset` of a byte-packed, MSB-first buffer.
#[inline(always)]
pub fn get_bits(buf: &[u8], offset: usize, width: u32) -> u32 {
    compose(buf, offset, width, packed_16)
}

/// Extracts an unsigned value of `width` (1..=32) bits starting at bit
/// `offset` of a buffer holding one bit per byte.
#[inline(always)]
pub fn get_bits_unpacked(bits: &[u8], offset: usize, width: u32) -> u32 {
    compose(bits, offset, width, unpacked_16)
}

/// Packs one-bit-per-byte data into MSB-first bytes. A trailing partial byte
/// is zero padded.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, b)| acc | ((b & 1) << (7 - i)))
        })
        .collect()
}

/// Expands MSB-first bytes into one bit per byte.
pub fn unpack_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1))
        .collect()
}
