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

use std::collections::HashSet;

/// What `StoredFieldsReader::document` does with a stored field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FieldSelectorResult {
    /// Read the value now.
    Load,
    /// Read the value from the file when first asked for, then keep it.
    LazyLoad,
    /// Skip the field.
    NoLoad,
    /// Read the value and ignore the remaining fields of the document.
    LoadAndBreak,
    /// Only record the size of the value, see `StoredField::size`.
    Size,
    /// Record the size and ignore the remaining fields.
    SizeAndBreak,
    /// Like `LazyLoad` but the value is read from the file on every access.
    Latent,
}

/// Decides per field name which stored fields of a document get loaded
/// and how.
pub trait FieldSelector {
    fn accept(&self, field_name: &str) -> FieldSelectorResult;
}

impl<F> FieldSelector for F
where
    F: Fn(&str) -> FieldSelectorResult,
{
    fn accept(&self, field_name: &str) -> FieldSelectorResult {
        self(field_name)
    }
}

/// Loads every field eagerly.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadAllFieldSelector;

impl FieldSelector for LoadAllFieldSelector {
    fn accept(&self, _field_name: &str) -> FieldSelectorResult {
        FieldSelectorResult::Load
    }
}

/// Loads the first stored field of the document and stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadFirstFieldSelector;

impl FieldSelector for LoadFirstFieldSelector {
    fn accept(&self, _field_name: &str) -> FieldSelectorResult {
        FieldSelectorResult::LoadAndBreak
    }
}

/// Loads the fields named in `eager` right away and the ones in `lazy` on
/// demand; skips the rest. A name in both sets is loaded eagerly.
#[derive(Debug, Default, Clone)]
pub struct SetBasedFieldSelector {
    eager: HashSet<String>,
    lazy: HashSet<String>,
}

impl SetBasedFieldSelector {
    pub fn new(eager: HashSet<String>, lazy: HashSet<String>) -> Self {
        SetBasedFieldSelector { eager, lazy }
    }

    pub fn from_names(eager: &[&str], lazy: &[&str]) -> Self {
        SetBasedFieldSelector {
            eager: eager.iter().map(|s| s.to_string()).collect(),
            lazy: lazy.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FieldSelector for SetBasedFieldSelector {
    fn accept(&self, field_name: &str) -> FieldSelectorResult {
        if self.eager.contains(field_name) {
            FieldSelectorResult::Load
        } else if self.lazy.contains(field_name) {
            FieldSelectorResult::LazyLoad
        } else {
            FieldSelectorResult::NoLoad
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_based_selector() {
        let selector = SetBasedFieldSelector::from_names(&["title", "id"], &["body", "id"]);
        assert_eq!(selector.accept("title"), FieldSelectorResult::Load);
        assert_eq!(selector.accept("id"), FieldSelectorResult::Load);
        assert_eq!(selector.accept("body"), FieldSelectorResult::LazyLoad);
        assert_eq!(selector.accept("other"), FieldSelectorResult::NoLoad);
    }

    #[test]
    fn test_closure_selector() {
        let selector = |name: &str| {
            if name.starts_with('_') {
                FieldSelectorResult::NoLoad
            } else {
                FieldSelectorResult::Size
            }
        };
        assert_eq!(selector.accept("_meta"), FieldSelectorResult::NoLoad);
        assert_eq!(selector.accept("body"), FieldSelectorResult::Size);
        assert_eq!(
            LoadFirstFieldSelector.accept("x"),
            FieldSelectorResult::LoadAndBreak
        );
    }
}
