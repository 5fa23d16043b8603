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

use core::doc::StoredField;

#[derive(Debug, Default)]
pub struct Document {
    pub fields: Vec<StoredField>,
}

impl Document {
    pub fn new(fields: Vec<StoredField>) -> Document {
        Document { fields }
    }

    pub fn add(&mut self, field: StoredField) {
        self.fields.push(field);
    }

    /// Returns the first field with the given name.
    pub fn get(&self, name: &str) -> Option<&StoredField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_fields(&self, name: &str) -> Vec<&StoredField> {
        self.fields.iter().filter(|f| f.name == name).collect()
    }

    pub fn remove_fields(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::doc::FieldData;
    use core::util::VariantValue;

    fn field(name: &str, value: &str) -> StoredField {
        StoredField::new(name, 0, true, FieldData::Value(VariantValue::from(value)))
    }

    #[test]
    fn test_get_fields() {
        let mut doc = Document::default();
        doc.add(field("body", "first"));
        doc.add(field("title", "t"));
        doc.add(field("body", "second"));

        assert_eq!(doc.len(), 3);
        assert_eq!(
            doc.get("body").unwrap().string_value().unwrap(),
            Some("first".to_string())
        );
        assert_eq!(doc.get_fields("body").len(), 2);
        assert!(doc.get("missing").is_none());

        doc.remove_fields("body");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.fields[0].name(), "title");
    }

    #[test]
    fn test_size_only_field() {
        let f = StoredField::new("body", 0, false, FieldData::Size(10));
        assert_eq!(f.size(), Some(10));
        assert!(f.value().is_err());
        assert!(!f.is_lazy());
    }
}
