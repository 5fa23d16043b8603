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

use core::doc::FieldType;
use core::util::VariantValue;

use error::ErrorKind::IllegalArgument;
use error::Result;

/// One pre-analyzed occurrence of a term in a field.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub text: String,
    /// Distance from the previous token's position, usually 1.
    pub position_increment: i32,
    pub payload: Option<Vec<u8>>,
}

impl Token {
    pub fn new(text: &str) -> Token {
        Token {
            text: text.to_string(),
            position_increment: 1,
            payload: None,
        }
    }

    pub fn with_payload(text: &str, payload: Vec<u8>) -> Token {
        Token {
            text: text.to_string(),
            position_increment: 1,
            payload: Some(payload),
        }
    }
}

/// A field of a document handed to the indexing path.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    field_type: FieldType,
    field_data: Option<VariantValue>,
    tokens: Option<Vec<Token>>,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType, field_data: VariantValue) -> Field {
        Field {
            name: name.to_string(),
            field_type,
            field_data: Some(field_data),
            tokens: None,
        }
    }

    /// A field indexed from already analyzed tokens. It is stored only when
    /// `stored_value` is given.
    pub fn with_tokens(
        name: &str,
        field_type: FieldType,
        tokens: Vec<Token>,
        stored_value: Option<VariantValue>,
    ) -> Field {
        let mut field_type = field_type;
        field_type.stored = stored_value.is_some();
        Field {
            name: name.to_string(),
            field_type,
            field_data: stored_value,
            tokens: Some(tokens),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn field_data(&self) -> Option<&VariantValue> {
        self.field_data.as_ref()
    }

    /// The tokens to index: the explicit tokens if any, otherwise the string
    /// value split on whitespace when tokenized, or taken whole when not.
    pub fn tokens(&self) -> Result<Vec<Token>> {
        if let Some(ref tokens) = self.tokens {
            return Ok(tokens.clone());
        }
        match self.field_data {
            Some(VariantValue::VString(ref s)) => {
                if self.field_type.tokenized {
                    Ok(s.split_whitespace().map(Token::new).collect())
                } else {
                    Ok(vec![Token::new(s)])
                }
            }
            Some(ref v) if !self.field_type.tokenized && !v.is_numeric() => bail!(
                IllegalArgument(format!("field '{}' can't index binary values", self.name))
            ),
            Some(ref v) if !self.field_type.tokenized => Ok(vec![Token::new(&v.to_string())]),
            _ => bail!(IllegalArgument(format!(
                "field '{}' has neither tokens nor a string value to index",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokens() {
        let field = Field::new("body", FieldType::text(true), "first  test\tfile".into());
        let tokens: Vec<String> = field.tokens().unwrap().into_iter().map(|t| t.text).collect();
        assert_eq!(tokens, vec!["first", "test", "file"]);
    }

    #[test]
    fn test_untokenized() {
        let field = Field::new("id", FieldType::string(true), "doc 1".into());
        assert_eq!(field.tokens().unwrap(), vec![Token::new("doc 1")]);

        let field = Field::new("id", FieldType::string(false), VariantValue::Int(17));
        assert_eq!(field.tokens().unwrap(), vec![Token::new("17")]);

        let field = Field::new("raw", FieldType::string(false), vec![1u8, 2].into());
        assert!(field.tokens().is_err());
    }

    #[test]
    fn test_explicit_tokens() {
        let tokens = vec![Token::with_payload("a", vec![1]), Token::new("b")];
        let field = Field::with_tokens("body", FieldType::text(false), tokens.clone(), None);
        assert!(!field.field_type().stored);
        assert_eq!(field.tokens().unwrap(), tokens);
    }
}
