// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use core::store::io::{DataOutput, IndexOutput};

use error::{ErrorKind, Result};

use std::io::{self, Write};

use flate2::Crc;

const CHUNK_SIZE: usize = 8192;

/// In-memory `IndexOutput`, used to stage bytes that are later appended to
/// a real file in one go (per-document stored fields, skip list levels).
pub struct RAMOutputStream {
    name: String,
    store: Vec<u8>,
    crc: Option<Crc>,
}

impl RAMOutputStream {
    pub fn new(checksum: bool) -> Self {
        Self::with_name("noname", checksum)
    }

    pub fn with_name(name: &str, checksum: bool) -> Self {
        let crc = if checksum { Some(Crc::new()) } else { None };

        RAMOutputStream {
            name: name.to_string(),
            store: Vec::with_capacity(CHUNK_SIZE),
            crc,
        }
    }

    pub fn write_to(&self, out: &mut impl DataOutput) -> Result<()> {
        out.write_all(&self.store)?;
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn reset(&mut self) {
        self.store.clear();
        if let Some(ref mut crc) = self.crc {
            crc.reset();
        }
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.store.extend_from_slice(buf);
        if let Some(ref mut crc) = self.crc {
            crc.update(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.store.len() as i64
    }

    fn checksum(&self) -> Result<i64> {
        if let Some(ref crc) = self.crc {
            Ok((crc.sum() as i64) & 0xffff_ffffi64)
        } else {
            bail!(ErrorKind::IllegalState(
                "internal RAMOutputStream created with checksum disabled".into()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to_and_reset() {
        let mut buffer = RAMOutputStream::new(false);
        buffer.write_vint(300).unwrap();
        buffer.write_string("abc").unwrap();
        assert_eq!(buffer.file_pointer(), 6);
        assert!(buffer.checksum().is_err());

        let mut out: Vec<u8> = vec![9];
        buffer.write_to(&mut out).unwrap();
        assert_eq!(out, vec![9, 0xac, 0x02, 3, b'a', b'b', b'c']);

        buffer.reset();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_checksum_matches_crc32() {
        let mut buffer = RAMOutputStream::new(true);
        buffer.write_bytes(b"123456789", 0, 9).unwrap();
        // standard CRC32 check value
        assert_eq!(buffer.checksum().unwrap(), 0xcbf4_3926);
    }
}
