//! External package catalog interface.
//!
//! The realization engine consumes the catalog through this narrow
//! lock/cursor/evaluate surface and stays independent of the catalog's
//! internal representation. Locking pins a catalog reference to an exact
//! revision; a cursor then evaluates a single attribute path of the locked
//! catalog.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::System;

/// Reference to a package catalog, prior to locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
  pub url: String,
}

impl CatalogRef {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into() }
  }
}

/// A catalog reference pinned to an exact revision by [`Catalog::lock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedCatalogRef {
  pub url: String,
  pub rev: String,
}

/// Errors surfaced by the external catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
  /// The catalog reference could not be pinned to a revision.
  #[error("failed to lock catalog '{url}': {message}")]
  Lock { url: String, message: String },

  /// The requested attribute path does not exist in the catalog.
  #[error("attribute '{attr_path}' does not exist")]
  MissingAttribute { attr_path: String },

  /// Evaluating the attribute failed; the message is the catalog's own
  /// error text and is what failure classification inspects.
  #[error("evaluation failed: {message}")]
  Eval { message: String },
}

/// Attribute path of a package on a platform: `legacyPackages.<system>.<name>`.
pub fn package_attr_path(system: System, name: &str) -> Vec<String> {
  vec!["legacyPackages".to_string(), system.to_string(), name.to_string()]
}

/// Cursor into the catalog's evaluation state, bound to one attribute path.
///
/// A cursor is owned by the caller for the duration of a single evaluation
/// and never reused across names or platforms.
pub trait EvalCursor: Send {
  /// The attribute path this cursor is bound to.
  fn attr_path(&self) -> &[String];

  /// Force evaluation of the attribute, yielding the raw out-path string.
  fn evaluate(&mut self) -> Result<String, CatalogError>;
}

/// The package catalog surface consumed by the realizer.
pub trait Catalog {
  type Cursor: EvalCursor;

  /// Pin a catalog reference to an exact revision.
  fn lock(&self, catalog_ref: &CatalogRef) -> Result<LockedCatalogRef, CatalogError>;

  /// Open an evaluation cursor for one attribute path of a locked catalog.
  fn cursor(&self, locked: &LockedCatalogRef, attr_path: &[String]) -> Result<Self::Cursor, CatalogError>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{Arch, Os};

  #[test]
  fn attr_path_places_system_between_prefix_and_name() {
    let system = System::new(Arch::X86_64, Os::Linux);
    assert_eq!(
      package_attr_path(system, "ripgrep"),
      vec!["legacyPackages".to_string(), "x86_64-linux".to_string(), "ripgrep".to_string()],
    );
  }
}
