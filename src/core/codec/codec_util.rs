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

use core::store::io::{DataInput, DataOutput};

use error::ErrorKind::{IndexFormatTooNew, IndexFormatTooOld};
use error::Result;

/// Writes the 4-byte format version that starts every structured file.
pub fn write_format<T: DataOutput + ?Sized>(out: &mut T, version: i32) -> Result<()> {
    out.write_int(version)
}

/// Reads the format version written by `write_format` and validates that it
/// lies in `[min_ver, max_ver]`.
///
/// Versions below the range fail with `IndexFormatTooOld`, versions above it
/// with `IndexFormatTooNew`, so callers can tell an upgrade problem from a
/// corrupt or unreadable file.
pub fn check_format<T: DataInput + ?Sized>(
    data_input: &mut T,
    resource: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_ver = data_input.read_int()?;
    if actual_ver < min_ver {
        bail!(IndexFormatTooOld(
            resource.to_string(),
            actual_ver,
            min_ver,
            max_ver
        ));
    }
    if actual_ver > max_ver {
        bail!(IndexFormatTooNew(
            resource.to_string(),
            actual_ver,
            min_ver,
            max_ver
        ));
    }
    Ok(actual_ver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::ErrorKind;

    #[test]
    fn test_check_format() {
        let mut out = Vec::new();
        write_format(&mut out, 2).unwrap();
        assert_eq!(out, vec![0, 0, 0, 2]);
        let mut input: &[u8] = &out;
        assert_eq!(check_format(&mut input, "_0.fdt", 2, 3).unwrap(), 2);
    }

    #[test]
    fn test_check_format_out_of_range() {
        let mut out = Vec::new();
        write_format(&mut out, 1).unwrap();
        write_format(&mut out, 9).unwrap();
        let mut input: &[u8] = &out;

        let err = check_format(&mut input, "_0.fdt", 2, 3).unwrap_err();
        match err.kind() {
            ErrorKind::IndexFormatTooOld(resource, 1, 2, 3) => assert_eq!(resource, "_0.fdt"),
            e => panic!("unexpected error {:?}", e),
        }
        assert!(err.is_format_error());

        let err = check_format(&mut input, "_0.fdt", 2, 3).unwrap_err();
        match err.kind() {
            ErrorKind::IndexFormatTooNew(_, 9, 2, 3) => {}
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn test_check_format_truncated() {
        let mut input: &[u8] = &[0, 0];
        let err = check_format(&mut input, "_0.fdx", 2, 3).unwrap_err();
        assert!(!err.is_format_error());
    }
}
