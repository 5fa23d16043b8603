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

use std::cmp::{min, Ordering};

/// Length of the common prefix of two byte sequences.
pub fn bytes_difference(left: &[u8], right: &[u8]) -> usize {
    let len = min(left.len(), right.len());
    for i in 0..len {
        if left[i] != right[i] {
            return i;
        }
    }

    len
}

/// Compares two UTF-8 encoded strings as if they were compared by UTF-16
/// code units.
///
/// UTF-8 byte order is code point order. The two orders only disagree
/// between supplementary characters (lead byte `0xF0..=0xF4`, surrogate
/// pairs in UTF-16) and `U+E000..=U+FFFF` (lead byte `0xEE`/`0xEF`): UTF-16
/// puts the surrogates first. Lifting the `0xEE`/`0xEF` lead bytes above
/// `0xF4` at the first difference reproduces that.
pub fn utf8_cmp_as_utf16(a: &[u8], b: &[u8]) -> Ordering {
    let len = min(a.len(), b.len());
    for i in 0..len {
        let mut a_byte = a[i];
        let mut b_byte = b[i];
        if a_byte != b_byte {
            if a_byte >= 0xee && b_byte >= 0xee {
                if (a_byte & 0xfe) == 0xee {
                    a_byte += 0x0e;
                }
                if (b_byte & 0xfe) == 0xee {
                    b_byte += 0x0e;
                }
            }
            return a_byte.cmp(&b_byte);
        }
    }

    a.len().cmp(&b.len())
}
