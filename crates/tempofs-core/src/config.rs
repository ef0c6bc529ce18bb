//! Resource mapping loaded at startup.
//!
//! The configuration file is a YAML mapping from entry name to URL:
//!
//! ```yaml
//! readme.txt: https://example.test/readme.txt
//! dataset.bin: https://mirror.example.test/data/2024.bin
//! ```
//!
//! Entry order in the file is the order entries are listed in the mounted
//! directory.

use crate::error::ConfigError;
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::fs;
use std::path::Path;
use url::Url;

/// Validated, insertion-ordered name to URL mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    entries: IndexMap<String, Url>,
}

impl ResourceConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates a YAML document. An empty document yields an empty mapping.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Option<IndexMap<String, String>> = serde_yaml::from_str(text)?;
        Self::from_pairs(raw.unwrap_or_default())
    }

    /// Builds a configuration from `(name, url)` pairs, keeping their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut entries = IndexMap::new();
        for (name, url) in pairs {
            let name = name.into();
            validate_name(&name)?;
            let url = parse_url(&name, url.as_ref())?;
            match entries.entry(name) {
                Entry::Occupied(entry) => {
                    return Err(ConfigError::DuplicateName(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(url);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Iterates `(name, url)` in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.entries.iter().map(|(name, url)| (name.as_str(), url))
    }

    pub fn get(&self, name: &str) -> Option<&Url> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is reserved"
    } else if name.contains('/') {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
        name: name.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            name: name.to_string(),
            scheme: other.to_string(),
        }),
    }
}
