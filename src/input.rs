use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;

/// Buffered reader over a capture file or stdin. It may be handed to a
/// worker thread.
pub struct InputReader {
    reader: Box<dyn Read + Send>,
    /// Size of the input, when it is a regular file.
    len: Option<u64>,
}

impl InputReader {
    /// Opens `input_path`; "-" reads from stdin.
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let is_pipe = input_path.as_ref().as_os_str() == "-";

        let (reader, len): (Box<dyn Read + Send>, _) = if is_pipe {
            (Box::new(io::stdin()), None)
        } else {
            let file = File::open(input_path)?;
            let len = file.metadata()?.len();
            (Box::new(BufReader::new(file)), Some(len))
        };

        Ok(Self { reader, len })
    }

    #[cfg(test)]
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            len: None,
        }
    }

    /// Number of whole `record_size` records in the input, if known.
    pub fn records(&self, record_size: usize) -> Option<u64> {
        self.len.map(|len| len / record_size as u64)
    }

    /// Reads into `buffer`; 0 means EOF.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buffer)?)
    }

    /// Feeds the input to `callback` in chunks of at most `chunk_size`
    /// bytes until EOF or until the callback returns `Ok(false)`.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.read_chunk(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            if !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}

/// Reassembles fixed-size records from arbitrarily split chunks.
#[derive(Debug)]
pub struct RecordBuffer {
    record_size: usize,
    pending: Vec<u8>,
}

impl RecordBuffer {
    pub fn new(record_size: usize) -> Self {
        Self {
            record_size,
            pending: Vec::with_capacity(record_size),
        }
    }

    /// Calls `f` for every record completed by `chunk`.
    pub fn push<F>(&mut self, mut chunk: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        if !self.pending.is_empty() {
            let take = (self.record_size - self.pending.len()).min(chunk.len());
            self.pending.extend_from_slice(&chunk[..take]);
            chunk = &chunk[take..];

            if self.pending.len() < self.record_size {
                return Ok(());
            }
            f(&self.pending)?;
            self.pending.clear();
        }

        let mut records = chunk.chunks_exact(self.record_size);
        for record in records.by_ref() {
            f(record)?;
        }
        self.pending.extend_from_slice(records.remainder());

        Ok(())
    }

    /// Bytes of an incomplete trailing record.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
