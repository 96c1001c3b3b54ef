//! Bounded bit reader for FIG payloads.
//!
//! FIG handlers address fields by absolute bit offset from the start of the
//! FIG, so on top of sequential reads the reader offers [`get_at`]. Every
//! read is bounded by the slice the reader was built on; a read past the end
//! fails with [`io::ErrorKind::UnexpectedEof`] instead of touching the
//! neighbouring FIG or the CRC.
//!
//! [`get_at`]: BitstreamIoReader::get_at

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    /// Reads `n` bits starting at absolute bit `offset`.
    #[inline(always)]
    pub fn get_at<I: UnsignedInteger>(&mut self, offset: usize, n: u32) -> io::Result<I> {
        if offset as u64 + n as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_at({offset}, {n}): out of bounds bits, {} available",
                    self.len
                ),
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(offset as u64))?;
        self.get_n(n)
    }

    /// Reads the single bit at absolute bit `offset`.
    #[inline(always)]
    pub fn flag_at(&mut self, offset: usize) -> io::Result<bool> {
        self.get_at::<u8>(offset, 1).map(|bit| bit == 1)
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_access_reads() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut reader = BsIoSliceReader::from_slice(&data);

        assert_eq!(reader.get_at::<u16>(8, 16).unwrap(), 0x3456);
        assert_eq!(reader.get_at::<u8>(0, 4).unwrap(), 0x1);
        assert_eq!(reader.get_at::<u32>(0, 32).unwrap(), 0x1234_5678);
        assert!(reader.flag_at(3).unwrap());
        assert!(!reader.flag_at(0).unwrap());
    }

    #[test]
    fn sequential_reads_follow_random_access() {
        let data = [0xA5, 0xF0];
        let mut reader = BsIoSliceReader::from_slice(&data);

        assert_eq!(reader.get_at::<u8>(4, 4).unwrap(), 0x5);
        assert_eq!(reader.get_n::<u8>(4).unwrap(), 0xF);
        assert_eq!(reader.get_n::<u8>(4).unwrap(), 0x0);
        let err = reader.get_n::<u8>(1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reads_are_bounded() {
        let data = [0xFF, 0xFF];
        let mut reader = BsIoSliceReader::from_slice(&data[..1]);

        let err = reader.get_at::<u16>(4, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(reader.get_at::<u8>(0, 8).is_ok());
    }
}
