use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::Format;

/// What to do when a data record's declared address differs from the
/// running output offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AddressPolicy {
    /// Offsets advance by decoded length only.
    #[default]
    Ignore,
    /// Same output, but log the discontinuity.
    Warn,
    /// Flush any carried bytes and jump to the declared address.
    Resync,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisasmConfig {
    /// Input format; inferred from the file extension when absent.
    pub format: Option<Format>,
    pub address_policy: AddressPolicy,
    /// Descriptor file replacing the built-in catalog.
    pub descriptors: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
}

impl DisasmConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Format to use for `input`: explicit setting first, then the extension.
    pub fn resolve_format(&self, input: &Path) -> Option<Format> {
        self.format.or_else(|| Format::from_path(input))
    }
}
