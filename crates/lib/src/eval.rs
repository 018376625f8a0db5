//! Package evaluation and failure classification.
//!
//! One catalog evaluation becomes either a validated store path or a typed
//! failure. The catalog reports failures as error text; classification
//! happens here, at the evaluator boundary, and a catalog error never
//! escapes past it unclassified.

use tracing::debug;

use crate::catalog::{CatalogError, EvalCursor, package_attr_path};
use crate::platform::System;
use crate::store::StorePath;

/// Markers the catalog emits when a package is blocked by policy.
const INSECURE_MARKERS: [&str; 2] = ["is marked as insecure", "is marked as broken"];

/// Marker the catalog emits when a package excludes the host platform.
const UNSUPPORTED_MARKER: &str = "is not available on the requested hostPlatform";

/// Why a package failed to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalFailureKind {
  /// Blocked by policy (insecure or broken); running it requires an
  /// explicit override.
  InsecurePackage,
  /// The catalog entry excludes the requested platform.
  UnsupportedSystem,
  /// Opaque evaluation failure: missing attribute, a broken package
  /// definition, or a store path the grammar rejects.
  Other,
}

/// A classified evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailure {
  pub kind: EvalFailureKind,
  pub message: String,
}

/// Result of evaluating one package reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
  /// Evaluation produced a validated store path.
  Realized { store_path: StorePath },
  /// Evaluation failed; the kind tells the caller how to react.
  Failed(EvalFailure),
}

impl EvaluationOutcome {
  pub fn is_realized(&self) -> bool {
    matches!(self, Self::Realized { .. })
  }
}

/// Evaluate one package through its cursor.
///
/// The cursor must be bound to `legacyPackages.<system>.<name>`; handing in
/// a cursor for any other attribute path is a programming error.
///
/// Evaluation succeeding with an out-path the store grammar rejects is a
/// failure ([`EvalFailureKind::Other`]), never surfaced as success.
pub fn evaluate_package<C>(cursor: &mut C, name: &str, system: System) -> EvaluationOutcome
where
  C: EvalCursor + ?Sized,
{
  debug_assert_eq!(
    cursor.attr_path(),
    package_attr_path(system, name).as_slice(),
    "cursor is not bound to the package being evaluated",
  );

  debug!(package = name, system = %system, "evaluating package");

  match cursor.evaluate() {
    Ok(out_path) => match StorePath::parse(&out_path) {
      Ok(store_path) => {
        debug!(package = name, store_path = %store_path, "package evaluated");
        EvaluationOutcome::Realized { store_path }
      }
      Err(err) => {
        debug!(package = name, error = %err, "evaluation produced an invalid store path");
        EvaluationOutcome::Failed(EvalFailure {
          kind: EvalFailureKind::Other,
          message: format!("package '{name}' evaluated to an invalid store path: {err}"),
        })
      }
    },
    Err(err) => {
      let failure = classify_catalog_error(name, system, &err);
      debug!(package = name, kind = ?failure.kind, "evaluation failed");
      EvaluationOutcome::Failed(failure)
    }
  }
}

/// Map a catalog error onto the three-way failure taxonomy.
///
/// The markers are the catalog's own error text; retargeting this engine
/// against a different catalog means updating them while keeping the
/// three-way split.
pub(crate) fn classify_catalog_error(name: &str, system: System, err: &CatalogError) -> EvalFailure {
  let text = err.to_string();

  if INSECURE_MARKERS.iter().any(|marker| text.contains(marker)) {
    return EvalFailure {
      kind: EvalFailureKind::InsecurePackage,
      message: format!("package '{name}' is blocked by policy: {text}"),
    };
  }
  if text.contains(UNSUPPORTED_MARKER) {
    return EvalFailure {
      kind: EvalFailureKind::UnsupportedSystem,
      message: format!("package '{name}' is not available for '{system}': {text}"),
    };
  }
  EvalFailure {
    kind: EvalFailureKind::Other,
    message: format!("package '{name}' failed to evaluate: {text}"),
  }
}
