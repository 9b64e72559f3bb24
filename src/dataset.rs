//! Test data generation
//!
//! Random alphanumeric strings, ordered datasets of unique key/value pairs and the
//! payload size ladder used by the benchmark.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashSet;

/// Size of the alphanumeric alphabet
const ALPHABET_LEN: u32 = 62;

/// Random alphanumeric string of exactly `len` characters
pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Whether `size` distinct strings of length `str_len` can exist
pub fn can_hold(size: usize, str_len: usize) -> bool {
    match ALPHABET_LEN.checked_pow(str_len.min(u32::MAX as usize) as u32) {
        Some(distinct) => size as u64 <= u64::from(distinct),
        None => true,
    }
}

/// Insertion-ordered list of unique (key, value) pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pairs: Vec<(String, String)>,
}

impl Dataset {
    /// Generate `size` pairs with random keys and values of `str_len` characters
    ///
    /// Keys are unique. Values are not required to be.
    pub fn generate(size: usize, str_len: usize) -> Self {
        debug_assert!(can_hold(size, str_len));

        let mut seen = HashSet::with_capacity(size);
        let mut pairs = Vec::with_capacity(size);
        while pairs.len() < size {
            let key = random_string(str_len);
            if seen.insert(key.clone()) {
                pairs.push((key, random_string(str_len)));
            }
        }

        Dataset { pairs }
    }

    /// Build from explicit pairs, dropping later duplicates of a key
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen = HashSet::new();
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| seen.insert(k.clone()))
            .collect();
        Dataset { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Whether index `i` falls in the pre-set half used by the conditional SET cases
    ///
    /// The half is inclusive of the midpoint: indices `0..=len/2`.
    pub fn in_first_half(&self, i: usize) -> bool {
        i <= self.len() / 2
    }
}

/// Powers of two from `2^floor(log2(min))` to `2^floor(log2(max))` inclusive
pub fn payload_sizes(min: usize, max: usize) -> Vec<usize> {
    if min == 0 || min > max {
        return Vec::new();
    }
    (min.ilog2()..=max.ilog2()).map(|exp| 1usize << exp).collect()
}
