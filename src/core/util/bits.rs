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

use error::ErrorKind::IllegalArgument;
use error::Result;

use std::sync::Arc;

/// Read-only per document flags.
pub trait Bits: Send + Sync {
    fn get(&self, index: usize) -> Result<bool>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BitsRef = Arc<dyn Bits>;

/// Fixed size bit set; as a deletions mask a set bit means "deleted".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedBitSet {
    bits: Vec<u64>,
    num_bits: usize,
}

impl FixedBitSet {
    pub fn new(num_bits: usize) -> FixedBitSet {
        FixedBitSet {
            bits: vec![0u64; (num_bits + 63) >> 6],
            num_bits,
        }
    }

    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        self.bits[index >> 6] |= 1u64 << (index & 63);
    }

    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        self.bits[index >> 6] &= !(1u64 << (index & 63));
    }

    #[inline]
    pub fn get_bit(&self, index: usize) -> bool {
        index < self.num_bits && (self.bits[index >> 6] & (1u64 << (index & 63))) != 0
    }

    pub fn cardinality(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl Bits for FixedBitSet {
    fn get(&self, index: usize) -> Result<bool> {
        if index >= self.num_bits {
            bail!(IllegalArgument(format!(
                "index {} out of bounds for {} bits",
                index, self.num_bits
            )));
        }
        Ok(self.get_bit(index))
    }

    fn len(&self) -> usize {
        self.num_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_bit_set() {
        let mut bits = FixedBitSet::new(130);
        bits.set(0);
        bits.set(64);
        bits.set(129);
        assert_eq!(bits.cardinality(), 3);
        assert!(bits.get(64).unwrap());
        assert!(!bits.get(65).unwrap());
        assert!(bits.get(130).is_err());

        bits.clear(64);
        assert!(!bits.get_bit(64));
        assert_eq!(bits.len(), 130);
    }
}
