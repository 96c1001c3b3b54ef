//! FIB payload splitting and FIG headers.
//!
//! A FIB carries 30 data bytes followed by the CRC. The data bytes hold a
//! sequence of FIGs, each starting with a header byte (3-bit type, 5-bit
//! length of the FIG data field in bytes), terminated by the end marker
//! `0xFF` or by running out of bytes.

use anyhow::Result;

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::FigError;

/// Data bytes of a FIB.
pub const FIB_DATA_BYTES: usize = 30;

/// Data bytes plus the 16-bit CRC.
pub const FIB_BYTES: usize = 32;

pub const END_MARKER: u8 = 0xFF;

/// One FIG located inside a FIB.
#[derive(Debug, Clone, Copy)]
pub struct Fig<'a> {
    pub fig_type: u8,
    /// Length field of the header: bytes following the header byte.
    pub length: usize,
    /// Byte offset of the header within the FIB.
    pub offset: usize,
    /// Header byte and data field, `length + 1` bytes.
    pub data: &'a [u8],
}

impl<'a> Fig<'a> {
    /// Reader bounded to this FIG. Bit 0 is the first bit of the header byte.
    pub fn reader(&self) -> BsIoSliceReader<'a> {
        BsIoSliceReader::from_slice(self.data)
    }

    /// Extension field for FIG types 0 and 1, if the FIG carries one.
    pub fn extension(&self) -> Option<u8> {
        let byte = *self.data.get(1)?;
        match self.fig_type {
            0 => Some(byte & 0x1F),
            1 => Some(byte & 0x07),
            _ => None,
        }
    }
}

/// Splits the data bytes of a FIB into FIGs.
///
/// A FIG whose length runs past the data bytes is reported once and ends
/// the iteration; nothing after it can be trusted.
#[derive(Debug, Clone)]
pub struct FigIter<'a> {
    fib: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> FigIter<'a> {
    pub fn new(fib: &'a [u8]) -> Self {
        let end = fib.len().min(FIB_DATA_BYTES);

        Self {
            fib: &fib[..end],
            pos: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for FigIter<'a> {
    type Item = Result<Fig<'a>, FigError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.fib.len() {
            return None;
        }

        let header = self.fib[self.pos];
        if header == END_MARKER {
            self.done = true;
            return None;
        }

        let fig_type = header >> 5;
        let length = (header & 0x1F) as usize;
        let offset = self.pos;
        let available = self.fib.len() - offset - 1;

        if length > available {
            self.done = true;
            return Some(Err(FigError::LengthOverrun {
                fig_type,
                offset,
                len: length,
                available,
            }));
        }

        self.pos += length + 1;

        Some(Ok(Fig {
            fig_type,
            length,
            offset,
            data: &self.fib[offset..offset + length + 1],
        }))
    }
}

/// Second header byte of a FIG type 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fig0Header {
    /// C/N: 0 starts a new database for the extension, 1 continues it.
    pub cn: bool,
    /// OE: the information is about another ensemble.
    pub oe: bool,
    /// P/D: 32-bit (data) service ids instead of 16-bit (programme).
    pub pd: bool,
    pub extension: u8,
}

impl Fig0Header {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let cn = reader.flag_at(8)?;
        let oe = reader.get()?;
        let pd = reader.get()?;
        let extension = reader.get_n(5)?;

        Ok(Self {
            cn,
            oe,
            pd,
            extension,
        })
    }

    /// Width in bits of a service id.
    pub fn sid_bits(&self) -> u32 {
        if self.pd { 32 } else { 16 }
    }
}

/// Second header byte of a FIG type 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fig1Header {
    pub charset: u8,
    pub oe: bool,
    pub extension: u8,
}

impl Fig1Header {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let charset = reader.get_at(8, 4)?;
        let oe = reader.get()?;
        let extension = reader.get_n(3)?;

        Ok(Self {
            charset,
            oe,
            extension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_until_end_marker() {
        let mut fib = [END_MARKER; FIB_BYTES];
        fib[..4].copy_from_slice(&[0x02, 0x00, 0xAB, 0x21]);
        fib[4] = 0x00;

        let figs: Vec<_> = FigIter::new(&fib).collect::<Result<_, _>>().unwrap();

        assert_eq!(figs.len(), 2);
        assert_eq!(figs[0].fig_type, 0);
        assert_eq!(figs[0].length, 2);
        assert_eq!(figs[0].data, &[0x02, 0x00, 0xAB]);
        assert_eq!(figs[1].fig_type, 1);
        assert_eq!(figs[1].offset, 3);
        assert_eq!(figs[1].data, &[0x21, 0x00]);
    }

    #[test]
    fn overrun_stops_iteration() {
        let mut fib = [0u8; FIB_BYTES];
        fib[0] = 0x01;
        fib[2] = 0x1F;

        let mut iter = FigIter::new(&fib);

        assert!(iter.next().unwrap().is_ok());
        match iter.next() {
            Some(Err(FigError::LengthOverrun {
                offset,
                len,
                available,
                ..
            })) => {
                assert_eq!(offset, 2);
                assert_eq!(len, 31);
                assert_eq!(available, 27);
            }
            other => panic!("expected overrun, got {other:?}"),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn crc_bytes_are_never_parsed() {
        let mut fib = [0u8; FIB_BYTES];
        // 29 zero-length FIGs fill bytes 0..29, the last one needs byte 30
        fib[29] = 0x01;

        let figs: Vec<_> = FigIter::new(&fib).collect();

        assert_eq!(figs.len(), 30);
        assert!(figs[..29].iter().all(|f| f.is_ok()));
        assert!(figs[29].is_err());
    }

    #[test]
    fn headers() {
        let data = [0x05, 0b1010_0010, 0x00];
        let fig = Fig {
            fig_type: 0,
            length: 2,
            offset: 0,
            data: &data,
        };
        let hdr = Fig0Header::read(&mut fig.reader()).unwrap();
        assert_eq!(
            hdr,
            Fig0Header {
                cn: true,
                oe: false,
                pd: true,
                extension: 2
            }
        );
        assert_eq!(hdr.sid_bits(), 32);

        let data = [0x35, 0b0000_1101];
        let fig = Fig {
            fig_type: 1,
            length: 1,
            offset: 0,
            data: &data,
        };
        let hdr = Fig1Header::read(&mut fig.reader()).unwrap();
        assert_eq!(hdr.charset, 0);
        assert!(hdr.oe);
        assert_eq!(hdr.extension, 5);
    }
}
