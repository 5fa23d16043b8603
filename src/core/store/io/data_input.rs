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

use error::ErrorKind::{IllegalArgument, IllegalState, UnexpectedEOF};
use error::{Error, Result};

use byteorder::{BigEndian, ReadBytesExt};

use std::cmp::min;
use std::io::{self, Read};

fn map_eof(e: io::Error, expected: usize) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        UnexpectedEOF(format!("Reached EOF when {} bytes are expected", expected)).into()
    } else {
        e.into()
    }
}

/// Sequential reader of the primitive encodings every index file is built
/// from: big-endian fixed width ints, variable length ints and strings.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        if self.read(&mut buffer)? != 1 {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ))
        } else {
            Ok(buffer[0])
        }
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        let end = offset + length;
        if b.len() < end {
            let msg = format!(
                "Buffer too small: writing [{}, {}) to [0, {})",
                offset,
                end,
                b.len(),
            );
            bail!(IllegalArgument(msg));
        }

        self.read_exact(&mut b[offset..end])
            .map_err(|e| map_eof(e, length))
    }

    fn read_int(&mut self) -> Result<i32> {
        self.read_i32::<BigEndian>().map_err(|e| map_eof(e, 4))
    }

    fn read_long(&mut self) -> Result<i64> {
        self.read_i64::<BigEndian>().map_err(|e| map_eof(e, 8))
    }

    fn read_vint(&mut self) -> Result<i32> {
        let mut b = (self.read_byte()?) as i8;
        if b >= 0 {
            return Ok(i32::from(b));
        }

        let mut i = i32::from(b) & 0x7f;
        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 7;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 14;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 21;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x0f) << 28;

        if (b as u8 & 0xf0) != 0 {
            bail!(IllegalState("Invalid vInt detected".to_owned()));
        }

        Ok(i)
    }

    fn read_vlong(&mut self) -> Result<i64> {
        let mut b = self.read_byte()? as i8;
        if b >= 0 {
            return Ok(i64::from(b));
        }

        let mut i = i64::from(b) & 0x7f_i64;
        let mut shift = 7;
        while shift <= 56 {
            b = self.read_byte()? as i8;
            i |= (i64::from(b) & 0x7f_i64) << shift;
            if b >= 0 {
                return Ok(i);
            }
            shift += 7;
        }
        bail!(IllegalState("Invalid vLong detected".to_owned()))
    }

    /// Reads a VInt byte length followed by that many UTF-8 bytes.
    fn read_string(&mut self) -> Result<String> {
        let length = self.read_vint()?;
        if length < 0 {
            bail!(IllegalState("Invalid String detected".to_owned()));
        }

        let mut buffer = vec![0u8; length as usize];
        self.read_exact(&mut buffer)
            .map_err(|e| map_eof(e, length as usize))?;
        Ok(String::from_utf8(buffer)?)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        const SKIP_BUFFER_SIZE: usize = 1024;
        let mut skip_buffer = [0u8; SKIP_BUFFER_SIZE];
        let mut skipped = 0;

        while skipped < count {
            let step = min(SKIP_BUFFER_SIZE, count - skipped);
            self.read_bytes(&mut skip_buffer, 0, step)?;
            skipped += step;
        }
        Ok(())
    }
}

impl<'a> DataInput for &'a [u8] {
    fn read_byte(&mut self) -> Result<u8> {
        if self.is_empty() {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ));
        }
        let b = self[0];
        *self = &self[1..];
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.len() < count {
            bail!(UnexpectedEOF(format!(
                "Reached EOF when skipping {} bytes",
                count
            )));
        }

        *self = &self[count..];
        Ok(())
    }
}
