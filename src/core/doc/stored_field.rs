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

use core::codec::stored_fields::LazyField;
use core::util::VariantValue;

use error::ErrorKind::IllegalState;
use error::Result;

/// How much of a stored field was read when its document was loaded.
#[derive(Debug)]
pub enum FieldData {
    Value(VariantValue),
    /// Read from the stored fields file on access.
    Lazy(LazyField),
    /// Only the size was read, see `FieldSelectorResult::Size`.
    Size(i32),
}

/// A stored field as returned by `StoredFieldsReader::document`.
#[derive(Debug)]
pub struct StoredField {
    pub name: String,
    pub number: u32,
    pub tokenized: bool,
    pub data: FieldData,
}

impl StoredField {
    pub fn new(name: &str, number: u32, tokenized: bool, data: FieldData) -> StoredField {
        StoredField {
            name: name.to_string(),
            number,
            tokenized,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lazy(&self) -> bool {
        match self.data {
            FieldData::Lazy(_) => true,
            _ => false,
        }
    }

    pub fn size(&self) -> Option<i32> {
        match self.data {
            FieldData::Size(size) => Some(size),
            _ => None,
        }
    }

    /// Returns the value, reading it first when the field is lazy.
    pub fn value(&self) -> Result<VariantValue> {
        match self.data {
            FieldData::Value(ref v) => Ok(v.clone()),
            FieldData::Lazy(ref lazy) => lazy.value(),
            FieldData::Size(_) => bail!(IllegalState(format!(
                "only the size of field '{}' was loaded",
                self.name
            ))),
        }
    }

    pub fn string_value(&self) -> Result<Option<String>> {
        Ok(self.value()?.into_string())
    }

    pub fn binary_value(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.value()?.into_binary())
    }
}
