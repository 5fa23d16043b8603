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

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, RwLock};

use core::store::directory::Directory;
use core::store::io::{ByteArrayDataInput, ByteArrayRef, DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use error::ErrorKind::IllegalArgument;
use error::Result;

use flate2::Crc;

type RAMFile = Arc<RwLock<Vec<u8>>>;

/// Heap resident `Directory`.
///
/// Inputs opened on a file see the bytes written up to the moment they are
/// opened.
#[derive(Default)]
pub struct RAMDirectory {
    files: RwLock<BTreeMap<String, RAMFile>>,
}

impl RAMDirectory {
    pub fn new() -> RAMDirectory {
        RAMDirectory::default()
    }

    fn file(&self, name: &str) -> Result<RAMFile> {
        match self.files.read()?.get(name) {
            Some(file) => Ok(Arc::clone(file)),
            None => bail!(IllegalArgument(format!("file not found: {}", name))),
        }
    }
}

impl Directory for RAMDirectory {
    type IndexOutput = RAMIndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        Ok(self.files.read()?.keys().cloned().collect())
    }

    fn file_exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.read()?.contains_key(name))
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        let file = self.file(name)?;
        let len = file.read()?.len();
        Ok(len as i64)
    }

    fn create_output(&self, name: &str, _context: &IOContext) -> Result<Self::IndexOutput> {
        let file: RAMFile = Arc::new(RwLock::new(Vec::new()));
        self.files
            .write()?
            .insert(name.to_string(), Arc::clone(&file));
        Ok(RAMIndexOutput {
            name: name.to_string(),
            file,
            crc: Crc::new(),
            length: 0,
        })
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let file = self.file(name)?;
        let snapshot = file.read()?.clone();
        Ok(Box::new(ByteArrayDataInput::new(ByteArrayRef::new(
            Arc::new(snapshot),
        ))))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        if self.files.write()?.remove(name).is_none() {
            bail!(IllegalArgument(format!("file not found: {}", name)));
        }
        Ok(())
    }

    fn sync(&self, _name: &HashSet<String>) -> Result<()> {
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let mut files = self.files.write()?;
        match files.remove(source) {
            Some(file) => {
                files.insert(dest.to_string(), file);
                Ok(())
            }
            None => bail!(IllegalArgument(format!("file not found: {}", source))),
        }
    }
}

impl fmt::Display for RAMDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RAMDirectory@{:p}", self)
    }
}

/// Output appending straight into a `RAMDirectory` file.
pub struct RAMIndexOutput {
    name: String,
    file: RAMFile,
    crc: Crc,
    length: usize,
}

impl Write for RAMIndexOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.write() {
            Ok(mut data) => data.extend_from_slice(buf),
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("lock poisoned for {}", self.name),
                ))
            }
        }
        self.crc.update(buf);
        self.length += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMIndexOutput {}

impl IndexOutput for RAMIndexOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.length as i64
    }

    fn checksum(&self) -> Result<i64> {
        Ok((self.crc.sum() as i64) & 0xffff_ffffi64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::DataInput;
    use core::store::IO_CONTEXT_READ;

    #[test]
    fn test_ram_directory_round_trip() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("a.bin", &IOContext::Default).unwrap();
            out.write_vlong(1 << 40).unwrap();
            out.write_string("\u{1d11e}").unwrap();
            assert_eq!(out.file_pointer(), dir.file_length("a.bin").unwrap());
        }
        assert!(dir.file_exists("a.bin").unwrap());

        let mut input = dir.open_input("a.bin", &IO_CONTEXT_READ).unwrap();
        let mut clone = IndexInput::clone(&*input).unwrap();
        assert_eq!(input.read_vlong().unwrap(), 1 << 40);
        assert_eq!(input.read_string().unwrap(), "\u{1d11e}");
        assert_eq!(clone.read_vlong().unwrap(), 1 << 40);

        dir.rename("a.bin", "b.bin").unwrap();
        assert_eq!(dir.list_all().unwrap(), vec!["b.bin".to_string()]);
        dir.delete_file("b.bin").unwrap();
        assert!(dir.delete_file("b.bin").is_err());
        assert!(dir.open_input("b.bin", &IO_CONTEXT_READ).is_err());
    }
}
