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

use core::store::io::DataInput;

use error::ErrorKind::IllegalArgument;
use error::Result;

use byteorder::{BigEndian, WriteBytesExt};

use std::io::Write;

/// Size of the intermediate buffer `copy_bytes` streams through.
pub const COPY_BUFFER_SIZE: usize = 16384;

pub trait DataOutput: Write {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        let buf = [b; 1];
        self.write_all(&buf)?;
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, b: &[u8], offset: usize, length: usize) -> Result<()> {
        debug_assert!(offset + length <= b.len());
        self.write_all(&b[offset..offset + length])?;
        Ok(())
    }

    fn write_int(&mut self, i: i32) -> Result<()> {
        self.write_i32::<BigEndian>(i)?;
        Ok(())
    }

    fn write_long(&mut self, i: i64) -> Result<()> {
        self.write_i64::<BigEndian>(i)?;
        Ok(())
    }

    /// Writes an int in a variable-length format, 7 bits per byte with the
    /// high bit flagging that more bytes follow.
    ///
    /// Negative values are not supported: the caller must pass `i >= 0`.
    fn write_vint(&mut self, i: i32) -> Result<()> {
        debug_assert!(i >= 0, "negative vInt {}", i);
        let mut i = i as u32;
        while (i & !0x7f_u32) != 0 {
            self.write_byte(((i & 0x7f) | 0x80) as u8)?;
            i >>= 7;
        }
        self.write_byte(i as u8)
    }

    fn write_vlong(&mut self, i: i64) -> Result<()> {
        if i < 0 {
            bail!(IllegalArgument("Can't write negative vLong".to_owned()));
        }
        let mut i = i as u64;
        while (i & !0x7f_u64) != 0 {
            self.write_byte(((i & 0x7f_u64) | 0x80_u64) as u8)?;
            i >>= 7;
        }
        self.write_byte(i as u8)
    }

    /// Writes the UTF-8 byte length as a vInt, then the bytes.
    fn write_string(&mut self, s: &str) -> Result<()> {
        let s = s.as_bytes();
        self.write_vint(s.len() as i32)?;
        self.write_all(s)?;
        Ok(())
    }

    /// Copies `len` bytes from `from`, `COPY_BUFFER_SIZE` bytes at a time.
    fn copy_bytes<I: DataInput + ?Sized>(&mut self, from: &mut I, len: usize) -> Result<()> {
        let mut left = len;
        let mut copy_buffer = [0u8; COPY_BUFFER_SIZE];
        while left > 0 {
            let to_copy = if left > COPY_BUFFER_SIZE {
                COPY_BUFFER_SIZE
            } else {
                left
            };
            from.read_bytes(&mut copy_buffer, 0, to_copy)?;
            self.write_all(&copy_buffer[..to_copy])?;
            left -= to_copy;
        }
        Ok(())
    }
}

impl DataOutput for Vec<u8> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_bytes_spans_several_buffers() {
        let len = COPY_BUFFER_SIZE * 2 + 17;
        let source: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut input: &[u8] = &source;
        let mut out: Vec<u8> = Vec::new();
        out.copy_bytes(&mut input, len - 3).unwrap();
        assert_eq!(&out[..], &source[..len - 3]);
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_negative_vlong_rejected() {
        let mut out: Vec<u8> = Vec::new();
        assert!(out.write_vlong(-1).is_err());
        assert!(out.is_empty());
    }
}
