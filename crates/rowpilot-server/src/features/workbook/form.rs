//! URL-encoded form bodies
//!
//! The workbook form repeats keys (`selected_columns`, `selected`) and builds
//! key names from column names (`rename_<column>`, `field_<target>`), which a
//! struct-based extractor cannot express. [`FormFields`] keeps every pair in
//! submission order.

/// Decoded `application/x-www-form-urlencoded` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    pub fn parse(body: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value for `name`, in submission order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// `(suffix, value)` for every key starting with `prefix`
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.pairs.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix)
                .map(|suffix| (suffix, value.as_str()))
        })
    }
}
