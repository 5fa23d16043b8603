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

use std::fmt;

/// A stored field value as it is laid out in the `.fdt` file.
///
/// Strings and binaries are written length prefixed, the numeric kinds are
/// written as fixed width big-endian values and flagged in the field bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    VString(String),
    Binary(Vec<u8>),
}

impl VariantValue {
    pub fn is_numeric(&self) -> bool {
        match self {
            VariantValue::VString(_) | VariantValue::Binary(_) => false,
            _ => true,
        }
    }

    pub fn is_binary(&self) -> bool {
        match self {
            VariantValue::Binary(_) => true,
            _ => false,
        }
    }

    /// Number of bytes the payload occupies on disk, not counting the
    /// length prefix of strings and binaries.
    pub fn encoded_len(&self) -> usize {
        match self {
            VariantValue::Int(_) | VariantValue::Float(_) => 4,
            VariantValue::Long(_) | VariantValue::Double(_) => 8,
            VariantValue::VString(s) => s.len(),
            VariantValue::Binary(b) => b.len(),
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            VariantValue::VString(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_binary(self) -> Option<Vec<u8>> {
        match self {
            VariantValue::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VariantValue::Int(i) => write!(f, "{}", i),
            VariantValue::Long(l) => write!(f, "{}", l),
            VariantValue::Float(v) => write!(f, "{}", v),
            VariantValue::Double(v) => write!(f, "{}", v),
            VariantValue::VString(s) => write!(f, "{}", s),
            VariantValue::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl<'a> From<&'a str> for VariantValue {
    fn from(s: &'a str) -> VariantValue {
        VariantValue::VString(s.to_string())
    }
}

impl From<String> for VariantValue {
    fn from(s: String) -> VariantValue {
        VariantValue::VString(s)
    }
}

impl From<Vec<u8>> for VariantValue {
    fn from(b: Vec<u8>) -> VariantValue {
        VariantValue::Binary(b)
    }
}

impl From<i32> for VariantValue {
    fn from(i: i32) -> VariantValue {
        VariantValue::Int(i)
    }
}

impl From<i64> for VariantValue {
    fn from(l: i64) -> VariantValue {
        VariantValue::Long(l)
    }
}

impl From<f32> for VariantValue {
    fn from(v: f32) -> VariantValue {
        VariantValue::Float(v)
    }
}

impl From<f64> for VariantValue {
    fn from(v: f64) -> VariantValue {
        VariantValue::Double(v)
    }
}
