//! Factset - Ordered String Facts
//!
//! Facts are string key/value pairs resolved hierarchically
//! (environment -> project -> image). Assigning the absence sentinel
//! (`None` / YAML `null`) deletes a fact instead of storing it.

use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml_ng::Value;
use thiserror::Error;

/// Environment variables with this prefix seed a fact of the remaining name.
pub const FACT_ENV_PREFIX: &str = "TEDI_FACT_";

/// Every environment variable `V` is exposed as fact `ENV_V`.
pub const ENV_FACT_PREFIX: &str = "ENV_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("Fact names must be non-empty strings, got {0}")]
    InvalidKeyType(String),

    #[error("Fact \"{key}\" must be a string or null, got {found}")]
    InvalidValueType { key: String, found: String },

    #[error("Fact not found: {0}")]
    KeyNotFound(String),

    #[error("Facts must be declared as a mapping, got {0}")]
    NotAMapping(String),
}

/// An insertion-ordered set of string facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Factset {
    facts: IndexMap<String, String>,
}

impl Factset {
    /// A factset with no environment seeding.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed from the process environment, then apply `facts` on top.
    pub fn new<I, K, V>(facts: I) -> Result<Self, FactError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut factset = Self::from_process_env();
        for (key, value) in facts {
            factset.insert(key, value)?;
        }
        Ok(factset)
    }

    /// Snapshot the process environment. Variables that are not valid
    /// UTF-8 are skipped.
    pub fn from_process_env() -> Self {
        Self::from_environment(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Seed facts from an explicit environment snapshot.
    ///
    /// Every variable `V=x` becomes `ENV_V=x`, and every `TEDI_FACT_X=y`
    /// additionally becomes `X=y`. A `TEDI_FACT_` seed wins over an
    /// `ENV_` exposure of the same name.
    pub fn from_environment<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut facts = IndexMap::new();
        let mut seeded = IndexMap::new();

        for (name, value) in vars {
            let name = name.into();
            let value = value.into();
            if let Some(fact) = name.strip_prefix(FACT_ENV_PREFIX) {
                if !fact.is_empty() {
                    seeded.insert(fact.to_string(), value.clone());
                }
            }
            facts.insert(format!("{ENV_FACT_PREFIX}{name}"), value);
        }
        facts.extend(seeded);

        Self { facts }
    }

    /// Builder-style insert, for literals known to be valid.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, FactError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Strict lookup: a missing fact is an error.
    pub fn require(&self, key: &str) -> Result<&str, FactError> {
        self.get(key)
            .ok_or_else(|| FactError::KeyNotFound(key.to_string()))
    }

    /// Assign a fact. `None` deletes an existing fact and is a no-op
    /// for a missing one.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) -> Result<(), FactError> {
        let key = key.into();
        if key.is_empty() {
            return Err(FactError::InvalidKeyType("an empty string".to_string()));
        }
        match value {
            Some(value) => {
                self.facts.insert(key, value);
            }
            None => {
                self.facts.shift_remove(&key);
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), FactError> {
        self.set(key, Some(value.into()))
    }

    /// Delete a fact, failing if it is absent.
    pub fn remove(&mut self, key: &str) -> Result<String, FactError> {
        self.facts
            .shift_remove(key)
            .ok_or_else(|| FactError::KeyNotFound(key.to_string()))
    }

    /// Apply every pair with [`Factset::set`] semantics, in order, so later
    /// pairs win and `None` deletes.
    pub fn update<I, K>(&mut self, pairs: I) -> Result<(), FactError>
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Assign from untyped configuration values.
    pub fn set_raw(&mut self, key: &Value, value: &Value) -> Result<(), FactError> {
        let key = match key {
            Value::String(key) if !key.is_empty() => key.clone(),
            other => return Err(FactError::InvalidKeyType(describe(other))),
        };
        match value {
            Value::Null => self.set(key, None),
            Value::String(value) => self.set(key, Some(value.clone())),
            other => Err(FactError::InvalidValueType {
                key,
                found: describe(other),
            }),
        }
    }

    /// Apply a YAML mapping of declarations. Nothing is applied if any
    /// entry is invalid.
    pub fn update_raw(&mut self, declared: &Value) -> Result<(), FactError> {
        let mapping = match declared {
            Value::Null => return Ok(()),
            Value::Mapping(mapping) => mapping,
            other => return Err(FactError::NotAMapping(describe(other))),
        };

        let mut staged = self.clone();
        for (key, value) in mapping {
            staged.set_raw(key, value)?;
        }
        *self = staged;
        Ok(())
    }

    /// An independent snapshot.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn to_dict(&self) -> IndexMap<String, String> {
        self.facts.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Every base fact, overwritten by every override fact of the same
    /// name. Neither input is modified.
    pub fn merge(base: &Factset, overrides: &Factset) -> Factset {
        let mut merged = base.clone();
        for (key, value) in &overrides.facts {
            merged.facts.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Infallible collection: pairs with an empty key are skipped rather than
/// reported. Use [`Factset::insert`] where a bad key must surface as
/// [`FactError::InvalidKeyType`].
impl FromIterator<(String, String)> for Factset {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut factset = Self::empty();
        for (key, value) in iter {
            if !key.is_empty() {
                factset.facts.insert(key, value);
            }
        }
        factset
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) if s.is_empty() => "an empty string".to_string(),
        Value::String(s) => format!("string \"{s}\""),
        Value::Sequence(_) => "a sequence".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> Factset {
        Factset::empty().with("sky_color", "blue").unwrap()
    }

    fn yaml(src: &str) -> Value {
        serde_yaml_ng::from_str(src).unwrap()
    }

    #[test]
    fn membership() {
        let facts = facts();
        assert!(facts.contains("sky_color"));
        assert!(!facts.contains("grass_color"));
    }

    #[test]
    fn set_then_get() {
        let mut facts = facts();
        facts.insert("key_canary", "bird").unwrap();
        assert_eq!(facts.require("key_canary").unwrap(), "bird");
    }

    #[test]
    fn remove_deletes_and_missing_remove_fails() {
        let mut facts = facts();
        assert_eq!(facts.remove("sky_color").unwrap(), "blue");
        assert!(!facts.contains("sky_color"));
        assert_eq!(
            facts.remove("sky_color"),
            Err(FactError::KeyNotFound("sky_color".into()))
        );
    }

    #[test]
    fn setting_none_deletes_existing_fact() {
        let mut facts = facts();
        facts.set("sky_color", None).unwrap();
        assert!(!facts.contains("sky_color"));
    }

    #[test]
    fn setting_none_on_missing_fact_is_noop() {
        let mut facts = facts();
        facts.set("point", None).unwrap();
        assert!(!facts.contains("point"));
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut facts = facts();
        assert!(matches!(
            facts.insert("", "x"),
            Err(FactError::InvalidKeyType(_))
        ));
    }

    #[test]
    fn collecting_skips_empty_keys() {
        let facts: Factset = vec![
            ("animal".to_string(), "cow".to_string()),
            (String::new(), "lost".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts.get("animal"), Some("cow"));
    }

    #[test]
    fn non_string_values_are_rejected() {
        let mut facts = facts();
        for value in ["true", "false", "5", "1.5", "[a]", "{a: b}"] {
            let err = facts.set_raw(&yaml("test"), &yaml(value)).unwrap_err();
            assert!(matches!(err, FactError::InvalidValueType { .. }), "{value}");
        }
        assert!(!facts.contains("test"));
    }

    #[test]
    fn non_string_keys_are_rejected() {
        let mut facts = facts();
        for key in ["true", "false", "5", "~", "[a]", "''"] {
            let err = facts.set_raw(&yaml(key), &yaml("test")).unwrap_err();
            assert!(matches!(err, FactError::InvalidKeyType(_)), "{key}");
        }
    }

    #[test]
    fn raw_null_deletes() {
        let mut facts = facts();
        facts.set_raw(&yaml("sky_color"), &Value::Null).unwrap();
        assert!(!facts.contains("sky_color"));
    }

    #[test]
    fn update_raw_is_all_or_nothing() {
        let mut facts = facts();
        let err = facts
            .update_raw(&yaml("{sky_color: black, count: 3}"))
            .unwrap_err();
        assert!(matches!(err, FactError::InvalidValueType { .. }));
        assert_eq!(facts.get("sky_color"), Some("blue"));
    }

    #[test]
    fn update_raw_rejects_non_mappings() {
        let mut facts = facts();
        assert!(matches!(
            facts.update_raw(&yaml("[a, b]")),
            Err(FactError::NotAMapping(_))
        ));
        facts.update_raw(&Value::Null).unwrap();
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn update_applies_set_semantics_in_order() {
        let mut facts = facts();
        facts
            .update([
                ("sky_color", Some("black".to_string())),
                ("sky_color", Some("pink".to_string())),
                ("moon", Some("full".to_string())),
                ("moon", None),
            ])
            .unwrap();
        assert_eq!(facts.get("sky_color"), Some("pink"));
        assert!(!facts.contains("moon"));
    }

    #[test]
    fn get_defaults() {
        let facts = facts();
        assert_eq!(facts.get("complaints"), None);
        assert_eq!(facts.get_or("first_prize", "consolation_prize"), "consolation_prize");
        assert_eq!(facts.get_or("sky_color", "grey"), "blue");
        assert_eq!(
            facts.require("complaints"),
            Err(FactError::KeyNotFound("complaints".into()))
        );
    }

    #[test]
    fn copy_is_independent() {
        let mut original = facts();
        let mut copy = original.copy();
        copy.insert("sky_color", "grey").unwrap();
        original.insert("sea", "green").unwrap();
        assert_eq!(original.get("sky_color"), Some("blue"));
        assert_eq!(copy.get("sky_color"), Some("grey"));
        assert!(!copy.contains("sea"));
    }

    #[test]
    fn to_dict_preserves_insertion_order() {
        let mut facts = facts();
        facts.insert("b", "2").unwrap();
        facts.insert("a", "1").unwrap();
        facts.insert("sky_color", "red").unwrap();
        let keys: Vec<_> = facts.to_dict().into_keys().collect();
        assert_eq!(keys, ["sky_color", "b", "a"]);
    }

    #[test]
    fn environment_seeding() {
        let facts = Factset::from_environment([("TEDI_FACT_bird", "emu"), ("HOME", "/root")]);
        assert_eq!(facts.get("bird"), Some("emu"));
        assert_eq!(facts.get("ENV_HOME"), Some("/root"));
        assert_eq!(facts.get("ENV_TEDI_FACT_bird"), Some("emu"));
    }

    #[test]
    fn fact_seed_beats_env_exposure() {
        let facts = Factset::from_environment([("HOME", "/root"), ("TEDI_FACT_ENV_HOME", "/home/emu")]);
        assert_eq!(facts.get("ENV_HOME"), Some("/home/emu"));
    }

    #[test]
    fn explicit_facts_beat_environment() {
        let mut facts = Factset::from_environment([("TEDI_FACT_bird", "emu")]);
        facts.insert("bird", "kiwi").unwrap();
        assert_eq!(facts.get("bird"), Some("kiwi"));
    }

    #[test]
    fn process_environment_is_exposed() {
        let facts = Factset::new([("sky_color", "blue")]).unwrap();
        for (name, value) in std::env::vars_os() {
            if let (Ok(name), Ok(value)) = (name.into_string(), value.into_string()) {
                if name.starts_with(FACT_ENV_PREFIX) {
                    continue;
                }
                assert_eq!(facts.get(&format!("ENV_{name}")), Some(value.as_str()));
            }
        }
        assert_eq!(facts.get("sky_color"), Some("blue"));
    }

    #[test]
    fn merge_prefers_overrides_and_leaves_inputs_alone() {
        let base = Factset::empty()
            .with("animal", "cow").unwrap()
            .with("color", "brown").unwrap();
        let overrides = Factset::empty().with("color", "purple").unwrap();

        let merged = Factset::merge(&base, &overrides);
        assert_eq!(merged.get("animal"), Some("cow"));
        assert_eq!(merged.get("color"), Some("purple"));
        assert_eq!(base.get("color"), Some("brown"));
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn serializes_as_plain_mapping() {
        let json = serde_json::to_string(&facts()).unwrap();
        assert_eq!(json, r#"{"sky_color":"blue"}"#);
    }
}
