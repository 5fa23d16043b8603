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

use error::{ErrorKind::IllegalArgument, Result};
use std::cmp::Ordering;

/// What an indexed field records in its postings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexOptions {
    Docs,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions::DocsAndFreqsAndPositions
    }
}

impl IndexOptions {
    pub fn from(options: &str) -> Result<IndexOptions> {
        let res = match options {
            "positions" => IndexOptions::DocsAndFreqsAndPositions,
            "freqs" => IndexOptions::DocsAndFreqs,
            "docs" => IndexOptions::Docs,
            _ => {
                bail!(IllegalArgument(format!(
                    "failed to parse index option [{}]",
                    options
                )));
            }
        };
        Ok(res)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexOptions::DocsAndFreqs => "freqs",
            IndexOptions::DocsAndFreqsAndPositions => "positions",
            IndexOptions::Docs => "docs",
        }
    }

    pub fn has_freqs(self) -> bool {
        match self {
            IndexOptions::Docs => false,
            _ => true,
        }
    }

    pub fn has_positions(self) -> bool {
        match self {
            IndexOptions::DocsAndFreqsAndPositions => true,
            _ => false,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            IndexOptions::Docs => 1,
            IndexOptions::DocsAndFreqs => 2,
            IndexOptions::DocsAndFreqsAndPositions => 3,
        }
    }
}

impl Ord for IndexOptions {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl PartialOrd for IndexOptions {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_options_order() {
        assert!(IndexOptions::Docs < IndexOptions::DocsAndFreqs);
        assert!(IndexOptions::DocsAndFreqs < IndexOptions::DocsAndFreqsAndPositions);
        assert_eq!(
            ::std::cmp::min(IndexOptions::DocsAndFreqsAndPositions, IndexOptions::Docs),
            IndexOptions::Docs
        );
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
    }

    #[test]
    fn test_parse() {
        for opt in &[
            IndexOptions::Docs,
            IndexOptions::DocsAndFreqs,
            IndexOptions::DocsAndFreqsAndPositions,
        ] {
            assert_eq!(IndexOptions::from(opt.as_str()).unwrap(), *opt);
        }
        assert!(IndexOptions::from("offsets").is_err());
    }
}
