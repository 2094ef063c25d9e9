use crate::errors::ProgError;
use std::collections::HashMap;

/// A string-keyed multimap of configuration parameters.
///
/// The core never reads configuration files itself; callers build the map in
/// memory (or from whatever source they like) and the constructors of the
/// observers, predictors and load estimators pull typed values out of it.
/// Missing required keys fail construction with
/// [`ProgError::BadConfig`].
#[derive(Clone, Debug, Default)]
pub struct ConfigMap {
    entries: HashMap<String, Vec<String>>,
}

impl ConfigMap {
    pub fn new() -> ConfigMap {
        ConfigMap::default()
    }

    /// Sets a key to a list of string values, replacing any previous list.
    pub fn set<K: Into<String>>(&mut self, key: K, values: Vec<String>) {
        self.entries.insert(key.into(), values);
    }

    /// Sets a key to a single scalar value.
    pub fn set_scalar<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.entries.insert(key.into(), vec![value.to_string()]);
    }

    /// Sets a key to a list of numeric values.
    pub fn set_values<K: Into<String>>(&mut self, key: K, values: &[f64]) {
        self.entries
            .insert(key.into(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Checks that every listed key is present, reporting all missing keys
    /// at once.
    pub fn require_keys(&self, keys: &[&str]) -> Result<(), ProgError> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|k| !self.has_key(k))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProgError::BadConfig(format!(
                "missing required configuration parameters: {}",
                missing.join(", ")
            )))
        }
    }

    /// The raw list of values stored under `key`.
    pub fn get_vector(&self, key: &str) -> Result<&Vec<String>, ProgError> {
        self.entries
            .get(key)
            .ok_or_else(|| ProgError::BadConfig(format!("missing configuration key {}", key)))
    }

    /// A single floating-point value.
    pub fn get_f64(&self, key: &str) -> Result<f64, ProgError> {
        let values = self.get_vector(key)?;
        values
            .first()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ProgError::BadConfig(format!("{} is not a number", key)))
    }

    /// A single unsigned integer value.
    pub fn get_u64(&self, key: &str) -> Result<u64, ProgError> {
        let values = self.get_vector(key)?;
        values
            .first()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ProgError::BadConfig(format!("{} is not an unsigned integer", key)))
    }

    /// Every value under `key`, parsed as floating point.
    pub fn get_f64s(&self, key: &str) -> Result<Vec<f64>, ProgError> {
        self.get_vector(key)?
            .iter()
            .map(|v| {
                v.parse()
                    .map_err(|_| ProgError::BadConfig(format!("{} contains a non-number: {}", key, v)))
            })
            .collect()
    }
}
