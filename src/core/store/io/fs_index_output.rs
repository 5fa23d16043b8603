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
use core::store::IOContext;

use error::Result;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::CrcWriter;

const FLUSH_BUFFER_SIZE: usize = 8192;
const MERGE_BUFFER_SIZE: usize = 64 * 1024;

/// File backed output of a `FSDirectory`, buffered and checksummed as it is
/// written. Merges stream whole segments so they get a larger buffer.
pub struct FSIndexOutput {
    name: String,
    writer: CrcWriter<BufWriter<File>>,
    file_pointer: i64,
}

impl FSIndexOutput {
    pub fn new<P: AsRef<Path>>(name: String, path: P, context: &IOContext) -> Result<FSIndexOutput> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let capacity = if context.is_merge() {
            MERGE_BUFFER_SIZE
        } else {
            FLUSH_BUFFER_SIZE
        };
        Ok(FSIndexOutput {
            name,
            writer: CrcWriter::new(BufWriter::with_capacity(capacity, file)),
            file_pointer: 0,
        })
    }
}

impl Drop for FSIndexOutput {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("failed to flush {} at {}: {}", self.name, self.file_pointer, e);
        }
    }
}

impl DataOutput for FSIndexOutput {}

impl Write for FSIndexOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.writer.write(buf)?;
        self.file_pointer += count as i64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl IndexOutput for FSIndexOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.file_pointer
    }

    fn checksum(&self) -> Result<i64> {
        Ok(i64::from(self.writer.crc().sum()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::MergeInfo;
    use flate2::Crc;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_vint_and_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("_0.tis");
        let checksum = {
            let mut out =
                FSIndexOutput::new("_0.tis".to_string(), &path, &IOContext::Default).unwrap();
            out.write_byte(b'a').unwrap();
            out.write_vint(128).unwrap();
            assert_eq!(out.file_pointer(), 3);
            out.checksum().unwrap()
        };
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes, vec![b'a', 0x80, 0x01]);

        let mut crc = Crc::new();
        crc.update(&bytes);
        assert_eq!(checksum, i64::from(crc.sum()));
    }

    #[test]
    fn test_merge_output_flushes_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("_1.frq");
        let context = IOContext::Merge(MergeInfo::new(10, false));
        {
            let mut out = FSIndexOutput::new("_1.frq".to_string(), &path, &context).unwrap();
            for i in 0..1000 {
                out.write_int(i).unwrap();
            }
            assert_eq!(out.file_pointer(), 4000);
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), 4000);
    }
}
