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
use memmap::{Mmap, MmapOptions};

use std::cmp::min;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// `IndexInput` over a read-only memory map. Clones share the map.
#[derive(Clone)]
pub struct MmapIndexInput {
    map: Option<Arc<Mmap>>,
    position: usize,
    name: String,
}

impl MmapIndexInput {
    pub fn new<P: AsRef<Path>>(name: &str, path: P) -> Result<MmapIndexInput> {
        let map = MmapIndexInput::mmap(path.as_ref())?;
        Ok(MmapIndexInput {
            map,
            position: 0,
            name: name.to_string(),
        })
    }

    fn mmap(path: &Path) -> Result<Option<Arc<Mmap>>> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 {
            // zero length maps are rejected by the OS
            Ok(None)
        } else {
            let mmap = unsafe { MmapOptions::new().len(file_len).map(&file)? };
            Ok(Some(Arc::new(mmap)))
        }
    }

    #[inline]
    fn mapped(&self) -> &[u8] {
        match self.map {
            Some(ref map) => &map[..],
            None => &[],
        }
    }
}

impl Read for MmapIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.position;
        let size = {
            let bytes = self.mapped();
            let size = min(buf.len(), bytes.len().saturating_sub(position));
            buf[..size].copy_from_slice(&bytes[position..position + size]);
            size
        };
        self.position += size;
        Ok(size)
    }
}

impl DataInput for MmapIndexInput {
    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        let position = self.position;
        match self.mapped().get(position) {
            Some(b) => {
                let b = *b;
                self.position += 1;
                Ok(b)
            }
            None => bail!(UnexpectedEOF(format!(
                "read past EOF: {} at {}",
                self.name, position
            ))),
        }
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        let target = self.position + count;
        self.seek(target as i64)
    }
}

impl IndexInput for MmapIndexInput {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Clone::clone(self)))
    }

    fn file_pointer(&self) -> i64 {
        self.position as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 {
            bail!(IllegalArgument(format!("seeking to negative position {}", pos)));
        }
        if pos as u64 > self.len() {
            bail!(UnexpectedEOF(format!(
                "seek past EOF: {} to {} (length {})",
                self.name,
                pos,
                self.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    #[inline]
    fn len(&self) -> u64 {
        self.mapped().len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clones_have_independent_positions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, &[0u8, 0, 0, 7, 0x81, 0x01, 42]).unwrap();

        let mut input = MmapIndexInput::new("data.bin", &path).unwrap();
        assert_eq!(input.len(), 7);
        assert_eq!(input.read_int().unwrap(), 7);

        let mut other = IndexInput::clone(&input).unwrap();
        assert_eq!(other.file_pointer(), 4);
        assert_eq!(other.read_vint().unwrap(), 129);
        assert_eq!(input.file_pointer(), 4);

        input.seek(6).unwrap();
        assert_eq!(input.read_byte().unwrap(), 42);
        assert!(input.read_byte().is_err());
        assert!(input.seek(8).is_err());
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let mut input = MmapIndexInput::new("empty", &path).unwrap();
        assert!(input.is_empty());
        assert!(input.read_byte().is_err());
    }
}
