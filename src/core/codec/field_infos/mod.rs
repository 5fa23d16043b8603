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

mod field_infos_format;

pub use self::field_infos_format::*;

use error::ErrorKind::{IllegalArgument, IllegalState};
use error::Result;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::result;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use core::index::IndexOptions;

/// Per-segment metadata of one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub is_indexed: bool,
    pub index_options: IndexOptions,
    pub has_store_payloads: bool,
    pub has_store_term_vector: bool,
}

impl FieldInfo {
    pub fn new(
        name: String,
        number: u32,
        is_indexed: bool,
        index_options: IndexOptions,
        store_payloads: bool,
        store_term_vector: bool,
    ) -> Result<FieldInfo> {
        let info = FieldInfo {
            name,
            number,
            is_indexed,
            index_options,
            has_store_payloads: store_payloads,
            has_store_term_vector: store_term_vector,
        };

        info.check_consistency()?;
        Ok(info)
    }

    pub fn check_consistency(&self) -> Result<()> {
        if !self.is_indexed {
            if self.has_store_term_vector {
                bail!(IllegalState(format!(
                    "Illegal State: non-indexed field '{}' cannot store term vectors",
                    &self.name
                )));
            }
            if self.has_store_payloads {
                bail!(IllegalState(format!(
                    "Illegal State: non-indexed field '{}' cannot store payloads",
                    &self.name
                )));
            }
        } else if !self.index_options.has_positions() && self.has_store_payloads {
            bail!(IllegalState(format!(
                "Illegal State: indexed field '{}' cannot have payloads without positions",
                &self.name
            )));
        }

        Ok(())
    }

    /// Whether postings of this field carry positions.
    pub fn has_prox(&self) -> bool {
        self.is_indexed && self.index_options.has_positions()
    }

    /// Folds the flags another segment (or document) used for this field into
    /// this one. Once indexed, always indexed; term vectors and payloads are
    /// sticky; index options only ever downgrade.
    fn update(
        &mut self,
        is_indexed: bool,
        index_options: IndexOptions,
        store_payloads: bool,
        store_term_vector: bool,
    ) {
        if !is_indexed {
            // if updated field data is not for indexing, leave the updates out
            return;
        }
        if !self.is_indexed {
            self.is_indexed = true;
            self.index_options = index_options;
            self.has_store_payloads = store_payloads;
            self.has_store_term_vector = store_term_vector;
        } else {
            self.has_store_term_vector |= store_term_vector;
            self.has_store_payloads |= store_payloads;
            if self.index_options > index_options {
                self.index_options = index_options;
            }
        }

        if !self.index_options.has_positions() {
            // cannot store payloads if we don't store positions:
            self.has_store_payloads = false;
        }
        debug_assert!(self.check_consistency().is_ok());
    }
}

impl fmt::Display for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

/// The immutable set of `FieldInfo`s of a segment.
#[derive(Clone, Debug)]
pub struct FieldInfos {
    pub has_freq: bool,
    pub has_prox: bool,
    pub has_payloads: bool,
    pub has_vectors: bool,

    pub by_number: BTreeMap<u32, Arc<FieldInfo>>,
    pub by_name: HashMap<String, Arc<FieldInfo>>,
}

impl Serialize for FieldInfos {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("FieldInfos", 5)?;
        s.serialize_field("has_freq", &self.has_freq)?;
        s.serialize_field("has_prox", &self.has_prox)?;
        s.serialize_field("has_payloads", &self.has_payloads)?;
        s.serialize_field("has_vectors", &self.has_vectors)?;

        let fields: Vec<&FieldInfo> = self.by_number.values().map(Arc::as_ref).collect();
        s.serialize_field("fields", &fields)?;
        s.end()
    }
}

impl fmt::Display for FieldInfos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

impl FieldInfos {
    pub fn new(infos: Vec<FieldInfo>) -> Result<FieldInfos> {
        let mut has_vectors = false;
        let mut has_prox = false;
        let mut has_payloads = false;
        let mut has_freq = false;

        let mut by_number: BTreeMap<u32, Arc<FieldInfo>> = BTreeMap::new();
        let mut by_name: HashMap<String, Arc<FieldInfo>> = HashMap::new();

        for info in infos {
            let info = Arc::new(info);
            let number = info.number;

            if info.is_indexed {
                has_vectors |= info.has_store_term_vector;
                has_prox |= info.index_options.has_positions();
                has_freq |= info.index_options.has_freqs();
                has_payloads |= info.has_store_payloads;
            }

            if let Some(previous) = by_number.insert(number, Arc::clone(&info)) {
                bail!(IllegalArgument(format!(
                    "Illegal Argument: duplicated field numbers: {} and {} have: {}",
                    previous.name, &info.name, number
                )));
            }

            let name = info.name.clone();
            if let Some(previous) = by_name.insert(name.clone(), info) {
                bail!(IllegalArgument(format!(
                    "Illegal Argument: duplicated field names: {} and {} have: {}",
                    previous.number, number, &name
                )));
            }
        }
        Ok(FieldInfos {
            has_freq,
            has_prox,
            has_payloads,
            has_vectors,
            by_number,
            by_name,
        })
    }

    pub fn field_info_by_number(&self, field_number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&field_number).map(Arc::as_ref)
    }

    pub fn field_info_by_name(&self, field_name: &str) -> Option<&FieldInfo> {
        self.by_name.get(field_name).map(Arc::as_ref)
    }

    pub fn field_info_arc(&self, field_name: &str) -> Option<Arc<FieldInfo>> {
        self.by_name.get(field_name).cloned()
    }

    /// All field infos in field number order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FieldInfo>> {
        self.by_number.values()
    }

    /// Indexed fields sorted by name, the order fields appear in the term
    /// dictionary.
    pub fn indexed_fields(&self) -> Vec<Arc<FieldInfo>> {
        let mut fields: Vec<Arc<FieldInfo>> = self
            .by_number
            .values()
            .filter(|fi| fi.is_indexed)
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        fields
    }

    /// Whether every field of `self` has the same number in `other`, so raw
    /// stored-field bytes of `self` can be copied into a segment using
    /// `other`.
    pub fn numbering_matches(&self, other: &FieldInfos) -> bool {
        self.by_number.values().all(|fi| {
            other
                .field_info_by_number(fi.number)
                .map_or(false, |o| o.name == fi.name)
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects field infos, assigning dense numbers in insertion order.
#[derive(Default)]
pub struct FieldInfosBuilder {
    by_name: HashMap<String, FieldInfo>,
    next_number: u32,
}

impl FieldInfosBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a field or merges the flags into the existing one with the same
    /// name. Returns the field number.
    pub fn add(
        &mut self,
        name: &str,
        is_indexed: bool,
        index_options: IndexOptions,
        store_payloads: bool,
        store_term_vector: bool,
    ) -> Result<u32> {
        if let Some(field_info) = self.by_name.get_mut(name) {
            field_info.update(is_indexed, index_options, store_payloads, store_term_vector);
            return Ok(field_info.number);
        }

        let number = self.next_number;
        let store_payloads = store_payloads && is_indexed && index_options.has_positions();
        let fi = FieldInfo::new(
            name.to_string(),
            number,
            is_indexed,
            index_options,
            store_payloads,
            store_term_vector && is_indexed,
        )?;
        self.by_name.insert(name.to_string(), fi);
        self.next_number += 1;
        Ok(number)
    }

    pub fn add_info(&mut self, fi: &FieldInfo) -> Result<u32> {
        self.add(
            &fi.name,
            fi.is_indexed,
            fi.index_options,
            fi.has_store_payloads,
            fi.has_store_term_vector,
        )
    }

    pub fn add_infos(&mut self, other: &FieldInfos) -> Result<()> {
        for fi in other.iter() {
            self.add_info(fi)?;
        }
        Ok(())
    }

    pub fn field_number(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|fi| fi.number)
    }

    pub fn finish(&self) -> Result<FieldInfos> {
        let infos: Vec<FieldInfo> = self.by_name.values().cloned().collect();
        FieldInfos::new(infos)
    }
}
