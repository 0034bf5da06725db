//! Sequential display labels for converted icons ("j100", "100a", "aa100").
//!
//! Counters are keyed by prefix *and* start value: the "d" switches start at
//! 300, 500, 700 and 900 and count independently, while every NOC subject
//! shares the single "f"/100 counter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the number goes relative to the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    /// `j100`, `aa100`
    #[default]
    PrefixFirst,
    /// `100a`
    NumberFirst,
}

/// Label configuration for one deployment subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPrefixConfig {
    /// One or two letters
    pub prefix: String,
    /// First number issued
    pub start: u32,
    /// Label layout
    #[serde(default)]
    pub format: IdFormat,
}

impl IdPrefixConfig {
    /// Create a prefix-first configuration.
    pub fn new(prefix: impl Into<String>, start: u32) -> Self {
        Self {
            prefix: prefix.into(),
            start,
            format: IdFormat::PrefixFirst,
        }
    }

    /// Set the label format.
    pub fn with_format(mut self, format: IdFormat) -> Self {
        self.format = format;
        self
    }

    fn counter_key(&self) -> String {
        format!("{}_{}", self.prefix, self.start)
    }

    fn label(&self, number: u32) -> String {
        match self.format {
            IdFormat::PrefixFirst => format!("{}{}", self.prefix, number),
            IdFormat::NumberFirst => format!("{}{}", number, self.prefix),
        }
    }
}

/// Run-scoped label counters.
///
/// One assigner belongs to exactly one conversion; create a new one (or call
/// [`reset`](Self::reset)) before converting the next document.
#[derive(Debug, Clone)]
pub struct IdAssigner<'a> {
    prefixes: &'a HashMap<String, IdPrefixConfig>,
    counters: HashMap<String, u32>,
}

impl<'a> IdAssigner<'a> {
    /// Create an assigner over a subject → prefix table.
    pub fn new(prefixes: &'a HashMap<String, IdPrefixConfig>) -> Self {
        Self {
            prefixes,
            counters: HashMap::new(),
        }
    }

    /// Next label for `subject`, or `None` when the subject has no prefix.
    pub fn next_id(&mut self, subject: &str) -> Option<String> {
        let config = self.prefixes.get(subject)?;
        let number = self
            .counters
            .entry(config.counter_key())
            .and_modify(|n| *n += 1)
            .or_insert(config.start);
        Some(config.label(*number))
    }

    /// Forget every counter.
    pub fn reset(&mut self) {
        self.counters.clear();
    }

    /// Last issued number per counter key, for logging.
    pub fn current_counts(&self) -> &HashMap<String, u32> {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> HashMap<String, IdPrefixConfig> {
        let mut t = HashMap::new();
        t.insert("AP - Cisco MR36H".to_string(), IdPrefixConfig::new("j", 100));
        t.insert("AP - Cisco MR78".to_string(), IdPrefixConfig::new("k", 100));
        t.insert(
            "CCTV - Cisco MV93X".to_string(),
            IdPrefixConfig::new("a", 100).with_format(IdFormat::NumberFirst),
        );
        t.insert("HL - Artist".to_string(), IdPrefixConfig::new("bb", 100));
        t.insert("SW - Cisco 9300X 24X".to_string(), IdPrefixConfig::new("d", 300));
        t.insert("SW - Cisco 9300 12X36M".to_string(), IdPrefixConfig::new("d", 500));
        t.insert("DIST - Mini NOC".to_string(), IdPrefixConfig::new("f", 100));
        t.insert("DIST - Micro NOC".to_string(), IdPrefixConfig::new("f", 100));
        t
    }

    #[test]
    fn test_formats() {
        let t = table();
        let mut ids = IdAssigner::new(&t);
        assert_eq!(ids.next_id("AP - Cisco MR36H").as_deref(), Some("j100"));
        assert_eq!(ids.next_id("AP - Cisco MR36H").as_deref(), Some("j101"));
        assert_eq!(ids.next_id("CCTV - Cisco MV93X").as_deref(), Some("100a"));
        assert_eq!(ids.next_id("HL - Artist").as_deref(), Some("bb100"));
    }

    #[test]
    fn test_unknown_subject() {
        let t = table();
        let mut ids = IdAssigner::new(&t);
        assert_eq!(ids.next_id("FIBER"), None);
        assert!(ids.current_counts().is_empty());
    }

    #[test]
    fn test_same_prefix_different_start() {
        let t = table();
        let mut ids = IdAssigner::new(&t);
        assert_eq!(ids.next_id("SW - Cisco 9300X 24X").as_deref(), Some("d300"));
        assert_eq!(ids.next_id("SW - Cisco 9300 12X36M").as_deref(), Some("d500"));
        assert_eq!(ids.next_id("SW - Cisco 9300X 24X").as_deref(), Some("d301"));
    }

    #[test]
    fn test_shared_counter() {
        let t = table();
        let mut ids = IdAssigner::new(&t);
        assert_eq!(ids.next_id("DIST - Mini NOC").as_deref(), Some("f100"));
        assert_eq!(ids.next_id("DIST - Micro NOC").as_deref(), Some("f101"));
        assert_eq!(ids.next_id("DIST - Mini NOC").as_deref(), Some("f102"));
    }

    #[test]
    fn test_reset() {
        let t = table();
        let mut ids = IdAssigner::new(&t);
        ids.next_id("AP - Cisco MR36H");
        ids.next_id("AP - Cisco MR36H");
        ids.reset();
        assert_eq!(ids.next_id("AP - Cisco MR36H").as_deref(), Some("j100"));
    }

    #[test]
    fn test_format_deserializes_from_snake_case() {
        let cfg: IdPrefixConfig = serde_json::from_str(r#"{"prefix":"c","start":100,"format":"number_first"}"#).unwrap();
        assert_eq!(cfg.format, IdFormat::NumberFirst);
        let cfg: IdPrefixConfig = serde_json::from_str(r#"{"prefix":"j","start":100}"#).unwrap();
        assert_eq!(cfg.format, IdFormat::PrefixFirst);
    }

    proptest! {
        #[test]
        fn prop_independent_counters_never_interleave(picks in proptest::collection::vec(any::<bool>(), 1..60)) {
            let t = table();
            let mut ids = IdAssigner::new(&t);
            let (mut j, mut k) = (Vec::new(), Vec::new());
            for pick_j in picks {
                if pick_j {
                    j.push(ids.next_id("AP - Cisco MR36H").unwrap());
                } else {
                    k.push(ids.next_id("AP - Cisco MR78").unwrap());
                }
            }
            let expected_j: Vec<String> = (0..j.len()).map(|i| format!("j{}", 100 + i)).collect();
            let expected_k: Vec<String> = (0..k.len()).map(|i| format!("k{}", 100 + i)).collect();
            prop_assert_eq!(j, expected_j);
            prop_assert_eq!(k, expected_k);
        }

        #[test]
        fn prop_shared_counter_is_one_sequence(picks in proptest::collection::vec(any::<bool>(), 1..60)) {
            let t = table();
            let mut ids = IdAssigner::new(&t);
            let labels: Vec<String> = picks
                .iter()
                .map(|&mini| ids.next_id(if mini { "DIST - Mini NOC" } else { "DIST - Micro NOC" }).unwrap())
                .collect();
            let expected: Vec<String> = (0..labels.len()).map(|i| format!("f{}", 100 + i)).collect();
            prop_assert_eq!(labels, expected);
        }

        #[test]
        fn prop_reset_restarts_every_counter(calls in 0usize..20) {
            let t = table();
            let mut ids = IdAssigner::new(&t);
            for _ in 0..calls {
                ids.next_id("SW - Cisco 9300X 24X");
                ids.next_id("CCTV - Cisco MV93X");
            }
            ids.reset();
            prop_assert_eq!(ids.next_id("SW - Cisco 9300X 24X").unwrap(), "d300");
            prop_assert_eq!(ids.next_id("CCTV - Cisco MV93X").unwrap(), "100a");
        }
    }
}
