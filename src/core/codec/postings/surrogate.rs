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

//! Code point ordered enumeration over a dictionary sorted by UTF-16 code
//! units.
//!
//! UTF-16 sorts supplementary characters (category S, surrogate pairs)
//! before U+E000..U+FFFF (category E) while code point order puts them
//! after. Both sort everything else (category A) first, so a UTF-16 ordered
//! dictionary reads `A S E` where callers expect `A E S`.
//!
//! After every raw step the delta between the previous and the current term
//! is inspected and up to three kinds of seeks fix the order at the first
//! character position that needs it:
//!
//! 1. push: the new suffix contains an S, seek forward to the E terms
//!    sharing the prefix and enumerate those first.
//! 2. continue: the stripped suffix of the previous term had an E, seek
//!    back to the S terms sharing the prefix.
//! 3. pop: the step replaced an S by an E, the S terms were already
//!    enumerated, so seek past the E terms.
//!
//! The dance can recurse at later positions, but its state can always be
//! derived from the previous and the current term.

use std::cmp::min;

use core::codec::postings::SeekStatus;

use error::Result;

const UTF8_NON_BMP_LEAD: u8 = 0xf0;
const UTF8_HIGH_BMP_LEAD: u8 = 0xee;

/// Whether the UTF-8 sequence starting with `b` encodes a char in
/// U+E000..U+FFFF, i.e. after the surrogates in UTF-16.
#[inline]
fn is_high_bmp(b: u8) -> bool {
    (b & UTF8_HIGH_BMP_LEAD) == UTF8_HIGH_BMP_LEAD
}

/// Whether the UTF-8 sequence starting with `b` encodes a char outside the
/// BMP, i.e. a surrogate pair in UTF-16.
#[inline]
fn is_non_bmp(b: u8) -> bool {
    (b & UTF8_NON_BMP_LEAD) == UTF8_NON_BMP_LEAD
}

/// Start of the last char the two terms have in common.
fn new_suffix_start(br1: &[u8], br2: &[u8]) -> usize {
    let limit = min(br1.len(), br2.len());
    let mut last_start = 0;
    for i in 0..limit {
        if (br1[i] & 0xc0) == 0xc0 || (br1[i] & 0x80) == 0 {
            last_start = i;
        }
        if br1[i] != br2[i] {
            return last_start;
        }
    }
    limit
}

/// Raw access to the terms of one field of a UTF-16 ordered dictionary.
///
/// The main cursor is the one being enumerated; the probe cursor is used to
/// look ahead without moving it. Every method returns the term the cursor
/// landed on, or `None` once it left the field.
pub trait RawTermCursor {
    /// Seeks the main cursor to the first term >= `target` in UTF-16 order.
    fn seek_main(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Seeks the probe cursor to the first term >= `target` in UTF-16 order.
    fn seek_probe(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Moves the main cursor to the next raw term.
    fn next_main(&mut self) -> Result<Option<Vec<u8>>>;

    fn main_term(&self) -> Option<&[u8]>;

    /// Number of bytes the main term shares with the raw term before it.
    fn main_prefix_len(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct SurrogateDance {
    prev_term: Vec<u8>,
    scratch_term: Vec<u8>,
    new_suffix_start: usize,
    skip_next: bool,
    current: Option<Vec<u8>>,
}

impl SurrogateDance {
    pub fn new() -> SurrogateDance {
        SurrogateDance::default()
    }

    /// The term returned by the last `next()` or `seek_ceil()`.
    pub fn current(&self) -> Option<&[u8]> {
        self.current.as_ref().map(Vec::as_slice)
    }

    /// Positions the cursor before the first term of the field in code
    /// point order.
    pub fn reset<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<()> {
        self.skip_next = true;
        self.current = None;
        if cursor.seek_main(&[])?.is_some() {
            self.new_suffix_start = 0;
            self.prev_term.clear();
            self.dance(cursor)?;
        }
        Ok(())
    }

    pub fn next<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<Option<Vec<u8>>> {
        if self.skip_next {
            self.skip_next = false;
            self.current = cursor.main_term().map(<[u8]>::to_vec);
            return Ok(self.current.clone());
        }

        match cursor.main_term() {
            Some(term) => {
                self.prev_term.clear();
                self.prev_term.extend_from_slice(term);
            }
            None => {
                self.current = None;
                return Ok(None);
            }
        }

        if cursor.next_main()?.is_some() {
            self.new_suffix_start = cursor.main_prefix_len();
        } else {
            // the field is exhausted, but the dance may still seek back
            self.new_suffix_start = 0;
        }
        self.dance(cursor)?;
        self.current = cursor.main_term().map(<[u8]>::to_vec);
        Ok(self.current.clone())
    }

    pub fn seek_ceil<C: RawTermCursor>(
        &mut self,
        cursor: &mut C,
        target: &[u8],
    ) -> Result<SeekStatus> {
        self.skip_next = false;
        let found = cursor.seek_main(target)?;

        match found {
            Some(ref term) if term.as_slice() == target => {
                // an exact match needs no dance
                self.current = Some(target.to_vec());
                Ok(SeekStatus::Found)
            }
            None => {
                // hit the end of the field, try swapping an E of the target
                // for an S, backwards
                self.scratch_term.clear();
                self.scratch_term.extend_from_slice(target);
                for i in (0..target.len()).rev() {
                    if !is_high_bmp(target[i]) {
                        continue;
                    }
                    if let Some(term) = seek_to_non_bmp(cursor, target, i)? {
                        cursor.seek_main(&term)?;
                        self.scratch_term = term;
                        self.new_suffix_start = i + 1;
                        self.do_pushes(cursor)?;
                        self.current = cursor.main_term().map(<[u8]>::to_vec);
                        return Ok(if self.current.is_some() {
                            SeekStatus::NotFound
                        } else {
                            SeekStatus::End
                        });
                    }
                }
                self.current = None;
                Ok(SeekStatus::End)
            }
            Some(term) => {
                // a greater term, treat it like next() with the target as
                // the previous term
                self.prev_term.clear();
                self.prev_term.extend_from_slice(target);
                self.new_suffix_start = new_suffix_start(target, &term);
                self.dance(cursor)?;
                self.current = cursor.main_term().map(<[u8]>::to_vec);
                Ok(if self.current.is_some() {
                    SeekStatus::NotFound
                } else {
                    SeekStatus::End
                })
            }
        }
    }

    /// Called after the main cursor moved in UTF-16 order, possibly seeks it
    /// to a different term that is next in code point order.
    fn dance<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<()> {
        self.scratch_term.clear();
        if let Some(term) = cursor.main_term() {
            self.scratch_term.extend_from_slice(term);
        }

        // possibly several pops, then a continue
        loop {
            if self.do_continue(cursor)? || !self.do_pop(cursor)? {
                break;
            }
        }

        self.do_pushes(cursor)
    }

    /// Continue: scan the suffix stripped from the previous term backwards.
    /// For an E there, try to seek back to an S at the same position.
    fn do_continue<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<bool> {
        let mut down_to = self.prev_term.len() as isize - 1;
        let limit = min(
            self.new_suffix_start as isize,
            self.scratch_term.len() as isize - 1,
        );

        while down_to > limit {
            let pos = down_to as usize;
            if is_high_bmp(self.prev_term[pos]) {
                if let Some(term) = seek_to_non_bmp(cursor, &self.prev_term, pos)? {
                    let landed = cursor.seek_main(&term)?;
                    self.new_suffix_start = pos;
                    self.scratch_term = landed.unwrap_or_default();
                    return Ok(true);
                }
            }

            // shorten the previous term so a later pass doesn't redo this
            let b = self.prev_term[pos];
            if (b & 0xc0) == 0xc0 || (b & 0x80) == 0 {
                self.prev_term.truncate(pos);
            }
            down_to -= 1;
        }
        Ok(false)
    }

    /// Pop: if the step replaced an S by an E, the S terms are done and the
    /// E terms were enumerated before them, so seek past the E.
    fn do_pop<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<bool> {
        let nss = self.new_suffix_start;
        if self.prev_term.len() > nss
            && nss < self.scratch_term.len()
            && is_non_bmp(self.prev_term[nss])
            && is_high_bmp(self.scratch_term[nss])
        {
            self.scratch_term.truncate(nss);
            self.scratch_term.push(0xff);

            match cursor.seek_main(&self.scratch_term)? {
                Some(term) => {
                    self.new_suffix_start = new_suffix_start(&self.prev_term, &term);
                    self.scratch_term = term;
                }
                None => {
                    self.new_suffix_start = 0;
                    self.scratch_term.clear();
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Push: for every S in the new suffix, try to seek forward to an E at
    /// the same position. Continues past a successful seek since the new
    /// suffix may need its own dance.
    fn do_pushes<C: RawTermCursor>(&mut self, cursor: &mut C) -> Result<()> {
        let mut up_to = self.new_suffix_start;

        while up_to < self.scratch_term.len() {
            let starts_dance = is_non_bmp(self.scratch_term[up_to])
                && (up_to > self.new_suffix_start
                    || up_to >= self.prev_term.len()
                    || (!is_non_bmp(self.prev_term[up_to])
                        && !is_high_bmp(self.prev_term[up_to])));
            if !starts_dance {
                up_to += 1;
                continue;
            }

            let mut target = Vec::with_capacity(up_to + 3);
            target.extend_from_slice(&self.scratch_term[..up_to]);
            target.extend_from_slice(&[UTF8_HIGH_BMP_LEAD, 0x80, 0x80]);

            let matched = match cursor.seek_probe(&target)? {
                Some(term) => {
                    if term.len() >= up_to + 3
                        && is_high_bmp(term[up_to])
                        && term[..up_to] == self.scratch_term[..up_to]
                    {
                        Some(term)
                    } else {
                        None
                    }
                }
                None => None,
            };

            match matched {
                Some(term) => {
                    let landed = cursor.seek_main(&term)?;
                    self.scratch_term = landed.unwrap_or(term);
                    // the char at up_to is known to be an E now
                    up_to += 3;
                }
                None => up_to += 1,
            }
        }
        Ok(())
    }
}

/// Probes for a term with an S at `pos` in place of the E of `term`, with
/// the same prefix before it.
fn seek_to_non_bmp<C: RawTermCursor>(
    cursor: &mut C,
    term: &[u8],
    pos: usize,
) -> Result<Option<Vec<u8>>> {
    debug_assert!(is_high_bmp(term[pos]));
    let mut target = Vec::with_capacity(pos + 4);
    target.extend_from_slice(&term[..pos]);
    target.extend_from_slice(&[0xf0, 0x90, 0x80, 0x80]);

    match cursor.seek_probe(&target)? {
        Some(found) => {
            if found.len() >= pos + 4 && is_non_bmp(found[pos]) && found[..pos] == term[..pos] {
                Ok(Some(found))
            } else {
                Ok(None)
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::util::string_util::{bytes_difference, utf8_cmp_as_utf16};
    use rand::{thread_rng, Rng};

    /// A single field dictionary kept in UTF-16 order.
    pub struct MockCursor {
        terms: Vec<Vec<u8>>,
        main: usize,
        probe: usize,
    }

    impl MockCursor {
        pub fn new(terms: &[String]) -> MockCursor {
            let mut terms: Vec<Vec<u8>> = terms.iter().map(|t| t.as_bytes().to_vec()).collect();
            terms.sort_by(|a, b| utf8_cmp_as_utf16(a, b));
            terms.dedup();
            let main = terms.len();
            MockCursor {
                terms,
                main,
                probe: 0,
            }
        }

        fn ceil(&self, target: &[u8]) -> usize {
            self.terms
                .iter()
                .position(|t| utf8_cmp_as_utf16(t, target) != ::std::cmp::Ordering::Less)
                .unwrap_or_else(|| self.terms.len())
        }
    }

    impl RawTermCursor for MockCursor {
        fn seek_main(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>> {
            self.main = self.ceil(target);
            Ok(self.terms.get(self.main).cloned())
        }

        fn seek_probe(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>> {
            self.probe = self.ceil(target);
            Ok(self.terms.get(self.probe).cloned())
        }

        fn next_main(&mut self) -> Result<Option<Vec<u8>>> {
            if self.main < self.terms.len() {
                self.main += 1;
            }
            Ok(self.terms.get(self.main).cloned())
        }

        fn main_term(&self) -> Option<&[u8]> {
            self.terms.get(self.main).map(Vec::as_slice)
        }

        fn main_prefix_len(&self) -> usize {
            match (self.main, self.terms.get(self.main)) {
                (i, Some(term)) if i > 0 => bytes_difference(&self.terms[i - 1], term),
                _ => 0,
            }
        }
    }

    fn enumerate(terms: &[String]) -> Vec<String> {
        let mut cursor = MockCursor::new(terms);
        let mut dance = SurrogateDance::new();
        dance.reset(&mut cursor).unwrap();
        let mut out = Vec::new();
        while let Some(term) = dance.next(&mut cursor).unwrap() {
            out.push(String::from_utf8(term).unwrap());
        }
        out
    }

    fn code_point_sorted(terms: &[String]) -> Vec<String> {
        let mut sorted = terms.to_vec();
        sorted.sort();
        sorted.dedup();
        sorted
    }

    const ALPHABET: &[char] = &[
        'a', 'b', 'z', '\u{e9}', '\u{d7ff}', '\u{e000}', '\u{fb94}', '\u{ffff}', '\u{10000}',
        '\u{1d11e}', '\u{1d160}', '\u{29b05}', '\u{10ffff}',
    ];

    fn random_term<R: Rng>(rng: &mut R) -> String {
        let len = rng.gen_range(1, 6);
        (0..len)
            .map(|_| ALPHABET[rng.gen_range(0, ALPHABET.len())])
            .collect()
    }

    #[test]
    fn test_supplementary_after_high_bmp() {
        let terms = vec![
            "\u{29b05}abcdef".to_string(),
            "\u{fb94}mnopqr".to_string(),
        ];
        let cursor = MockCursor::new(&terms);
        // the raw order puts the surrogate pair first
        assert_eq!(cursor.terms[0], "\u{29b05}abcdef".as_bytes());
        assert_eq!(
            enumerate(&terms),
            vec!["\u{fb94}mnopqr".to_string(), "\u{29b05}abcdef".to_string()]
        );
    }

    #[test]
    fn test_nested_positions() {
        let terms: Vec<String> = vec![
            "a", "a\u{e000}", "a\u{10000}", "a\u{10000}\u{fb94}", "a\u{10000}\u{1d11e}",
            "a\u{10000}b", "a\u{ffff}z", "b", "\u{1d11e}\u{1d160}", "\u{1d11e}\u{e000}", "\u{e000}",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(enumerate(&terms), code_point_sorted(&terms));
    }

    #[test]
    fn test_random_enumeration() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let n = rng.gen_range(1, 60);
            let terms: Vec<String> = (0..n).map(|_| random_term(&mut rng)).collect();
            assert_eq!(enumerate(&terms), code_point_sorted(&terms), "{:?}", terms);
        }
    }

    #[test]
    fn test_random_seek_ceil() {
        let mut rng = thread_rng();
        for _ in 0..30 {
            let n = rng.gen_range(1, 40);
            let terms: Vec<String> = (0..n).map(|_| random_term(&mut rng)).collect();
            let expected = code_point_sorted(&terms);
            let mut cursor = MockCursor::new(&terms);
            let mut dance = SurrogateDance::new();
            dance.reset(&mut cursor).unwrap();

            for _ in 0..20 {
                let target = if rng.gen_bool(0.5) {
                    expected[rng.gen_range(0, expected.len())].clone()
                } else {
                    random_term(&mut rng)
                };
                let status = dance.seek_ceil(&mut cursor, target.as_bytes()).unwrap();
                let ceil = expected.iter().position(|t| *t >= target);
                match ceil {
                    Some(i) if expected[i] == target => assert_eq!(status, SeekStatus::Found),
                    Some(_) => assert_eq!(status, SeekStatus::NotFound, "{:?}", target),
                    None => assert_eq!(status, SeekStatus::End, "{:?}", target),
                }
                let start = match ceil {
                    Some(i) => i,
                    None => continue,
                };
                assert_eq!(dance.current(), Some(expected[start].as_bytes()));

                // enumeration continues in code point order from there
                for term in expected.iter().skip(start + 1).take(3) {
                    let next = dance.next(&mut cursor).unwrap();
                    assert_eq!(next.as_ref().map(Vec::as_slice), Some(term.as_bytes()));
                }
            }
        }
    }
}
