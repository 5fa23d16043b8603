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

//! Stored fields: the verbatim values of a document's stored fields.
//!
//! `.fdx` holds a format header then one 8-byte `.fdt` pointer per doc.
//! `.fdt` holds a format header then per doc a VInt field count and, per
//! field, its number (VInt), a flags byte and the value.

mod field_selector;

pub use self::field_selector::*;

mod lazy_field;

pub use self::lazy_field::*;

mod stored_fields_writer;

pub use self::stored_fields_writer::*;

mod stored_fields_reader;

pub use self::stored_fields_reader::*;

/// First format without compressed fields.
pub const FIELDS_FORMAT_MINIMUM: i32 = 2;
/// Adds numeric fields.
pub const FIELDS_FORMAT_NUMERIC: i32 = 3;
pub const FIELDS_FORMAT_CURRENT: i32 = FIELDS_FORMAT_NUMERIC;

/// Size of the format header of both files.
pub const FIELDS_FORMAT_SIZE: i64 = 4;

pub const FIELD_IS_TOKENIZED: u8 = 0x1;
pub const FIELD_IS_BINARY: u8 = 0x2;

pub const FIELD_NUMERIC_SHIFT: u8 = 3;
pub const FIELD_NUMERIC_MASK: u8 = 0x07 << FIELD_NUMERIC_SHIFT;
pub const FIELD_NUMERIC_INT: u8 = 1 << FIELD_NUMERIC_SHIFT;
pub const FIELD_NUMERIC_LONG: u8 = 2 << FIELD_NUMERIC_SHIFT;
pub const FIELD_NUMERIC_FLOAT: u8 = 3 << FIELD_NUMERIC_SHIFT;
pub const FIELD_NUMERIC_DOUBLE: u8 = 4 << FIELD_NUMERIC_SHIFT;

/// Merging copies raw docs in chunks of at most this many docs.
pub const MAX_RAW_MERGE_DOCS: usize = 4192;
