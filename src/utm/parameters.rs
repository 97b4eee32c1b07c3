//! Parameter sets and the suffix whitelist.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::sanitize::escape_html;

/// Prefix every tracked key carries.
pub const UTM_PREFIX: &str = "utm_";

/// Suffixes recognized when no whitelist is configured.
pub const DEFAULT_ALLOWED_SUFFIXES: [&str; 5] = ["source", "medium", "campaign", "term", "content"];

/// Prepend `utm_` unless the key already starts with it.
pub fn ensure_utm_prefix(key: &str) -> String {
    if key.starts_with(UTM_PREFIX) {
        key.to_string()
    } else {
        format!("{UTM_PREFIX}{key}")
    }
}

/// Captured UTM parameters keyed by their full `utm_*` name.
///
/// Values are stored escaped. Keys are stored literally so lookups by the
/// name a caller typed keep working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, String>);

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a full key (no prefix normalization).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pairs with the key escaped for rendering. Values are already escaped.
    pub fn display_pairs(&self) -> impl Iterator<Item = (String, &str)> {
        self.0.iter().map(|(k, v)| (escape_html(k), v.as_str()))
    }

    /// Overlay `newer` on top of `self`: keys in `newer` win, the rest stay.
    #[must_use]
    pub fn merged_with(&self, newer: &ParameterSet) -> ParameterSet {
        let mut merged = self.0.clone();
        merged.extend(newer.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        ParameterSet(merged)
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The set of recognized suffixes (`source`, `medium`, ...).
///
/// Entries may be configured with or without the `utm_` prefix; they are
/// stored as bare suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    suffixes: BTreeSet<String>,
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_SUFFIXES)
    }
}

impl Whitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = entries
            .into_iter()
            .map(|entry| {
                let entry = entry.as_ref().trim();
                entry.strip_prefix(UTM_PREFIX).unwrap_or(entry).to_string()
            })
            .filter(|suffix| !suffix.is_empty())
            .collect();
        Self { suffixes }
    }

    /// True when `key` is `utm_<suffix>` for a whitelisted suffix.
    #[must_use]
    pub fn allows(&self, key: &str) -> bool {
        key.strip_prefix(UTM_PREFIX)
            .is_some_and(|suffix| self.suffixes.contains(suffix))
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_prefix_is_idempotent() {
        assert_eq!(ensure_utm_prefix("source"), "utm_source");
        assert_eq!(ensure_utm_prefix("utm_source"), "utm_source");
        assert_eq!(ensure_utm_prefix(&ensure_utm_prefix("term")), "utm_term");
    }

    #[test]
    fn test_merge_prefers_newer() {
        let old: ParameterSet = [("utm_source", "google"), ("utm_campaign", "spring")]
            .into_iter()
            .collect();
        let new: ParameterSet = [("utm_source", "newsletter"), ("utm_medium", "email")]
            .into_iter()
            .collect();

        let merged = old.merged_with(&new);
        assert_eq!(merged.get("utm_source"), Some("newsletter"));
        assert_eq!(merged.get("utm_medium"), Some("email"));
        assert_eq!(merged.get("utm_campaign"), Some("spring"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_whitelist_accepts_both_spellings() {
        let whitelist = Whitelist::new(["utm_source", "medium", "", "  "]);
        assert!(whitelist.allows("utm_source"));
        assert!(whitelist.allows("utm_medium"));
        assert!(!whitelist.allows("utm_campaign"));
        assert!(!whitelist.allows("source"));
        assert!(!whitelist.allows("utm_"));
        assert_eq!(whitelist.suffixes().count(), 2);
    }

    #[test]
    fn test_default_whitelist() {
        let whitelist = Whitelist::default();
        for suffix in DEFAULT_ALLOWED_SUFFIXES {
            assert!(whitelist.allows(&format!("utm_{suffix}")));
        }
        assert!(!whitelist.allows("utm_campaign_id"));
        assert!(!whitelist.allows("utm_sql_injection"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let set: ParameterSet = [("utm_source", "google")].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!({ "utm_source": "google" }));
    }

    #[test]
    fn test_display_pairs_escape_keys() {
        let set: ParameterSet = [("utm_<b>", "x")].into_iter().collect();
        let pairs: Vec<_> = set.display_pairs().collect();
        assert_eq!(pairs, vec![("utm_&lt;b&gt;".to_string(), "x")]);
    }
}
