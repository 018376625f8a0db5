//! Manifest input types.
//!
//! The manifest is produced by the external resolver layer (package
//! selection, lockfile handling) and is read-only to this crate: packages
//! to evaluate, environment variables to export at activation time, and
//! hook scripts to stage. Hook order is activation order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::platform::System;

/// A resolved package to evaluate and realize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
  /// Attribute name of the package in the catalog.
  pub name: String,
  /// Platform the package is realized for.
  pub system: System,
}

impl PackageRef {
  pub fn new(name: impl Into<String>, system: System) -> Self {
    Self {
      name: name.into(),
      system,
    }
  }
}

/// How a staged hook script is wired into the activation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
  /// Sourced into the activating shell; exported variables and functions
  /// persist after activation.
  Sourced,
  /// Run as a separate process; only the exit status is observed.
  Execed,
}

/// One activation-time script to stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookScript {
  /// File name the script is staged under.
  pub name: String,
  /// Script contents, written verbatim.
  pub contents: String,
  /// Whether the activation script sources or execs it.
  pub mode: InvocationMode,
}

impl HookScript {
  pub fn new(name: impl Into<String>, contents: impl Into<String>, mode: InvocationMode) -> Self {
    Self {
      name: name.into(),
      contents: contents.into(),
      mode,
    }
  }
}

/// The complete environment definition handed to the realizer.
///
/// `vars` is a [`BTreeMap`] so the rendered exports are deterministic.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentManifest {
  /// Packages to evaluate, in manifest order.
  pub packages: Vec<PackageRef>,
  /// Environment variables exported by the activation script.
  #[serde(default)]
  pub vars: BTreeMap<String, String>,
  /// Hook scripts to stage, in activation order.
  #[serde(default)]
  pub hooks: Vec<HookScript>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invocation_mode_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&InvocationMode::Sourced).unwrap(), "\"sourced\"");
    assert_eq!(serde_json::to_string(&InvocationMode::Execed).unwrap(), "\"execed\"");
  }

  #[test]
  fn manifest_defaults_vars_and_hooks() {
    let manifest: EnvironmentManifest = serde_json::from_str(
      r#"{ "packages": [ { "name": "ripgrep", "system": "x86_64-linux" } ] }"#,
    )
    .unwrap();
    assert_eq!(manifest.packages.len(), 1);
    assert!(manifest.vars.is_empty());
    assert!(manifest.hooks.is_empty());
  }
}
