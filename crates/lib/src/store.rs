//! Store path validation.
//!
//! Store paths identify built package outputs in the catalog's
//! content-addressed store. The store itself is external; this module only
//! checks that a path the catalog hands back is syntactically well formed
//! (`<store-dir>/<digest>-<name>`) before the realizer treats it as a
//! package output.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the digest component of a store directory entry.
pub const DIGEST_LEN: usize = 32;

/// Digest alphabet: base-32 over digits and lowercase letters, omitting
/// `e`, `o`, `t`, and `u`.
const DIGEST_CHARS: &str = "0123456789abcdfghijklmnpqrsvwxyz";

/// A store path the external catalog would not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorePathError {
  #[error("store path '{0}' is not absolute")]
  NotAbsolute(String),

  #[error("store path '{0}' has no store directory entry")]
  MissingEntry(String),

  #[error("store path '{0}' has a malformed digest")]
  MalformedDigest(String),

  #[error("store path '{0}' has a malformed name")]
  MalformedName(String),
}

/// A syntactically validated store path.
///
/// Construction goes through [`StorePath::parse`]; a value of this type
/// always has an absolute store directory, a well-formed digest, and a
/// non-empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath {
  raw: String,
}

impl StorePath {
  /// Validate a raw path against the store path grammar.
  pub fn parse(raw: &str) -> Result<Self, StorePathError> {
    let path = Path::new(raw);
    if !path.is_absolute() {
      return Err(StorePathError::NotAbsolute(raw.to_string()));
    }

    // The entry must sit inside a store directory, not directly under `/`.
    let entry = match (path.parent(), path.file_name().and_then(|n| n.to_str())) {
      (Some(dir), Some(entry)) if dir != Path::new("/") => entry,
      _ => return Err(StorePathError::MissingEntry(raw.to_string())),
    };

    let (digest, name) = entry
      .split_once('-')
      .ok_or_else(|| StorePathError::MalformedDigest(raw.to_string()))?;
    if digest.len() != DIGEST_LEN || !digest.chars().all(|c| DIGEST_CHARS.contains(c)) {
      return Err(StorePathError::MalformedDigest(raw.to_string()));
    }
    if name.is_empty() || !name.chars().all(is_name_char) {
      return Err(StorePathError::MalformedName(raw.to_string()));
    }

    Ok(Self { raw: raw.to_string() })
  }

  /// The full path as handed back by the catalog.
  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// The store directory containing this entry.
  pub fn store_dir(&self) -> &Path {
    Path::new(&self.raw).parent().expect("validated at construction")
  }

  /// The digest component of the entry.
  pub fn digest(&self) -> &str {
    &self.entry()[..DIGEST_LEN]
  }

  /// The package name component of the entry.
  pub fn name(&self) -> &str {
    &self.entry()[DIGEST_LEN + 1..]
  }

  fn entry(&self) -> &str {
    Path::new(&self.raw)
      .file_name()
      .and_then(|n| n.to_str())
      .expect("validated at construction")
  }
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_' | '?' | '=')
}

impl fmt::Display for StorePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.raw)
  }
}

impl TryFrom<String> for StorePath {
  type Error = StorePathError;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    Self::parse(&raw)
  }
}

impl From<StorePath> for String {
  fn from(path: StorePath) -> Self {
    path.raw
  }
}
