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

/// Extension of field infos
pub const FIELD_INFOS_EXTENSION: &str = "fnm";

/// Extension of the term dictionary
pub const TERMS_EXTENSION: &str = "tis";

/// Extension of the term dictionary index
pub const TERMS_INDEX_EXTENSION: &str = "tii";

/// Extension of doc deltas, freqs and skip data
pub const FREQ_EXTENSION: &str = "frq";

/// Extension of positions and payloads
pub const PROX_EXTENSION: &str = "prx";

/// Extension of stored field data
pub const FIELDS_EXTENSION: &str = "fdt";

/// Extension of the stored field index
pub const FIELDS_INDEX_EXTENSION: &str = "fdx";

pub fn segment_file_name(name: &str, suffix: &str, ext: &str) -> String {
    let ext_len = ext.len();
    let sfx_len = suffix.len();

    if ext_len > 0 && sfx_len > 0 {
        format!("{}_{}.{}", name, suffix, ext)
    } else if ext_len > 0 {
        format!("{}.{}", name, ext)
    } else if sfx_len > 0 {
        format!("{}_{}", name, suffix)
    } else {
        String::from(name)
    }
}

pub fn matches_extension(filename: &str, ext: &str) -> bool {
    filename.ends_with(ext)
}

/// Returns the segment name a file belongs to, i.e. everything before the
/// first `.` or `_` after the leading `_`.
pub fn parse_segment_name(filename: &str) -> &str {
    let start = if filename.starts_with('_') { 1 } else { 0 };
    match filename[start..].find(|c| c == '.' || c == '_') {
        Some(idx) => &filename[..start + idx],
        None => filename,
    }
}
