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

use core::store::io::{DataInput, IndexInput};

use error::ErrorKind::{IllegalArgument, UnexpectedEOF};
use error::Result;

use std::cmp::min;
use std::io::{self, Read};
use std::sync::Arc;

/// Shared immutable byte buffer.
#[derive(Clone)]
pub struct ByteArrayRef(Arc<Vec<u8>>);

impl ByteArrayRef {
    pub fn new(v: Arc<Vec<u8>>) -> ByteArrayRef {
        ByteArrayRef(v)
    }
}

impl AsRef<[u8]> for ByteArrayRef {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// `DataInput` over an in-memory byte array.
///
/// `base` is the file pointer of the first byte, so a buffer holding a
/// section of a larger file keeps reporting file pointers of that file.
pub struct ByteArrayDataInput<T: AsRef<[u8]>> {
    bytes: T,
    pos: usize,
    base: i64,
}

impl<T: AsRef<[u8]>> ByteArrayDataInput<T> {
    pub fn new(bytes: T) -> ByteArrayDataInput<T> {
        Self::with_base(bytes, 0)
    }

    pub fn with_base(bytes: T, base: i64) -> ByteArrayDataInput<T> {
        ByteArrayDataInput {
            bytes,
            pos: 0usize,
            base,
        }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn length(&self) -> usize {
        self.bytes.as_ref().len()
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.length()
    }

    pub fn reset(&mut self, bytes: T) {
        self.bytes = bytes;
        self.pos = 0;
    }
}

impl<T: AsRef<[u8]>> DataInput for ByteArrayDataInput<T> {
    fn read_byte(&mut self) -> Result<u8> {
        match self.bytes.as_ref().get(self.pos) {
            Some(b) => {
                self.pos += 1;
                Ok(*b)
            }
            None => bail!(UnexpectedEOF(format!(
                "read past EOF at {} of {}",
                self.pos,
                self.length()
            ))),
        }
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, len: usize) -> Result<()> {
        if self.pos + len > self.length() {
            bail!(UnexpectedEOF(format!(
                "reading {} bytes at {} of {}",
                len,
                self.pos,
                self.length()
            )));
        }
        if offset + len > b.len() {
            bail!(IllegalArgument(format!(
                "Buffer too small: writing [{}, {}) to [0, {})",
                offset,
                offset + len,
                b.len()
            )));
        }
        b[offset..offset + len].copy_from_slice(&self.bytes.as_ref()[self.pos..self.pos + len]);
        self.pos += len;
        Ok(())
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.pos + count > self.length() {
            bail!(UnexpectedEOF(format!(
                "skipping {} bytes at {} of {}",
                count,
                self.pos,
                self.length()
            )));
        }
        self.pos += count;
        Ok(())
    }
}

impl<T: AsRef<[u8]>> Read for ByteArrayDataInput<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let size = min(buf.len(), self.length().saturating_sub(self.pos));
        buf[0..size].copy_from_slice(&self.bytes.as_ref()[self.pos..self.pos + size]);
        self.pos += size;
        Ok(size)
    }
}

impl<T> IndexInput for ByteArrayDataInput<T>
where
    T: AsRef<[u8]> + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(ByteArrayDataInput {
            bytes: self.bytes.clone(),
            pos: self.pos,
            base: self.base,
        }))
    }

    fn file_pointer(&self) -> i64 {
        self.base + self.pos as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        let relative = pos - self.base;
        if relative < 0 || relative as usize > self.length() {
            bail!(UnexpectedEOF(format!(
                "seek to {} outside [{}, {}]",
                pos,
                self.base,
                self.base + self.length() as i64
            )));
        }
        self.pos = relative as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.length() as u64
    }

    fn name(&self) -> &str {
        "ByteArrayDataInput"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_pointers_are_offset_by_base() {
        let mut input = ByteArrayDataInput::with_base(vec![1u8, 0x81, 0x01, 9], 100);
        assert_eq!(input.read_byte().unwrap(), 1);
        assert_eq!(input.file_pointer(), 101);
        assert_eq!(input.read_vint().unwrap(), 129);

        input.seek(101).unwrap();
        assert_eq!(input.position(), 1);
        assert!(input.seek(99).is_err());
        assert!(input.seek(105).is_err());

        input.seek(103).unwrap();
        let mut cloned = IndexInput::clone(&input).unwrap();
        assert_eq!(cloned.read_byte().unwrap(), 9);
        assert!(cloned.read_byte().is_err());
        assert!(!input.eof());
    }
}
