//! Environment realization.
//!
//! Orchestrates the full manifest: evaluate every package against the
//! catalog, collect failures without short-circuiting, then stage hook
//! scripts and compose the activation script in activation order.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::activate::{self, ActivationScript, StagingError};
use crate::catalog::{Catalog, CatalogError, CatalogRef, LockedCatalogRef, package_attr_path};
use crate::eval::{self, EvalFailure, EvaluationOutcome, evaluate_package};
use crate::manifest::{EnvironmentManifest, PackageRef};
use crate::store::StorePath;

/// One package that failed evaluation, with its classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFailure {
  pub package: PackageRef,
  pub failure: EvalFailure,
}

/// Errors that fail a realization as a whole.
#[derive(Debug, Error)]
pub enum RealizeError {
  /// Locking the catalog failed before any package was evaluated.
  #[error("failed to lock catalog")]
  Lock(#[source] CatalogError),

  /// One or more packages failed evaluation. Every failing package is
  /// enumerated; evaluation does not stop at the first failure.
  #[error("{0} package(s) failed evaluation", failures.len())]
  Evaluation { failures: Vec<PackageFailure> },

  /// Staging a hook script failed. Remaining hooks were not staged;
  /// already-staged files are kept.
  #[error("failed to stage activation scripts")]
  Staging(#[from] StagingError),

  /// An evaluation worker terminated abnormally.
  #[error("evaluation worker failed: {0}")]
  Worker(String),
}

/// Options for a realization run.
#[derive(Debug, Clone)]
pub struct RealizeOptions {
  /// Maximum number of package evaluations in flight at once.
  pub parallelism: usize,
}

impl Default for RealizeOptions {
  fn default() -> Self {
    Self {
      parallelism: default_parallelism(),
    }
  }
}

/// `BUILDENV_JOBS` overrides the evaluation fan-out; otherwise the
/// available CPU parallelism is used.
fn default_parallelism() -> usize {
  if let Ok(jobs) = std::env::var("BUILDENV_JOBS")
    && let Ok(jobs) = jobs.parse::<usize>()
    && jobs > 0
  {
    return jobs;
  }
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Result of a successful realization.
#[derive(Debug, Clone)]
pub struct Realization {
  /// Store paths to link into the environment, in manifest order.
  pub store_paths: Vec<StorePath>,
  /// Composed activation script text.
  pub activation_script: String,
}

/// Realize a manifest into store paths and an activation script.
///
/// Packages are evaluated on parallel workers bounded by
/// `options.parallelism`, one cursor per in-flight evaluation, and the
/// outcomes are committed in manifest order. Any evaluation failure fails
/// the realization with every failing package enumerated; hook scripts are
/// only staged once all packages evaluated.
pub async fn realize<C>(
  manifest: &EnvironmentManifest,
  catalog: Arc<C>,
  catalog_ref: &CatalogRef,
  scripts_dir: &Path,
  options: &RealizeOptions,
) -> Result<Realization, RealizeError>
where
  C: Catalog + Send + Sync + 'static,
{
  info!(
    packages = manifest.packages.len(),
    hooks = manifest.hooks.len(),
    "starting realization"
  );

  let locked = catalog.lock(catalog_ref).map_err(RealizeError::Lock)?;
  debug!(url = %locked.url, rev = %locked.rev, "catalog locked");

  let outcomes = evaluate_packages(manifest, catalog, &locked, options).await?;

  let mut store_paths = Vec::new();
  let mut failures = Vec::new();
  for (package, outcome) in manifest.packages.iter().zip(outcomes) {
    match outcome {
      EvaluationOutcome::Realized { store_path } => {
        debug!(package = %package.name, store_path = %store_path, "package realized");
        store_paths.push(store_path);
      }
      EvaluationOutcome::Failed(failure) => {
        error!(
          package = %package.name,
          system = %package.system,
          kind = ?failure.kind,
          "package failed evaluation"
        );
        failures.push(PackageFailure {
          package: package.clone(),
          failure,
        });
      }
    }
  }

  if !failures.is_empty() {
    return Err(RealizeError::Evaluation { failures });
  }

  // Stage hooks and compose the activation script in activation order. The
  // first staging failure aborts the rest; staged files are kept.
  let mut script = ActivationScript::new();
  for (name, value) in &manifest.vars {
    script.export_var(name, value);
  }
  for hook in &manifest.hooks {
    activate::stage_script(scripts_dir, &hook.name, &hook.contents)?;
    script.append(&hook.name, hook.mode);
  }
  activate::write_shell_profiles(scripts_dir, &script)?;

  info!(store_paths = store_paths.len(), "realization complete");

  Ok(Realization {
    store_paths,
    activation_script: script.render(),
  })
}

/// Evaluate every package on parallel blocking workers.
///
/// Each worker obtains its own cursor; results carry their manifest index
/// and are reordered before returning, so the caller sees manifest order
/// regardless of completion order.
async fn evaluate_packages<C>(
  manifest: &EnvironmentManifest,
  catalog: Arc<C>,
  locked: &LockedCatalogRef,
  options: &RealizeOptions,
) -> Result<Vec<EvaluationOutcome>, RealizeError>
where
  C: Catalog + Send + Sync + 'static,
{
  let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
  let mut join_set = JoinSet::new();

  for (index, package) in manifest.packages.iter().cloned().enumerate() {
    let catalog = Arc::clone(&catalog);
    let locked = locked.clone();
    let semaphore = Arc::clone(&semaphore);

    join_set.spawn(async move {
      let _permit = semaphore.acquire().await.expect("semaphore closed");

      // Catalog evaluation is a blocking call; keep it off the runtime.
      let outcome = tokio::task::spawn_blocking(move || {
        let attr_path = package_attr_path(package.system, &package.name);
        let mut cursor = match catalog.cursor(&locked, &attr_path) {
          Ok(cursor) => cursor,
          Err(err) => {
            return EvaluationOutcome::Failed(eval::classify_catalog_error(
              &package.name,
              package.system,
              &err,
            ));
          }
        };
        evaluate_package(&mut cursor, &package.name, package.system)
      })
      .await;

      (index, outcome)
    });
  }

  let mut outcomes: Vec<Option<EvaluationOutcome>> = manifest.packages.iter().map(|_| None).collect();
  while let Some(joined) = join_set.join_next().await {
    let (index, outcome) = joined.map_err(|err| RealizeError::Worker(err.to_string()))?;
    let outcome = outcome.map_err(|err| RealizeError::Worker(err.to_string()))?;
    outcomes[index] = Some(outcome);
  }

  Ok(
    outcomes
      .into_iter()
      .map(|outcome| outcome.expect("every package evaluated"))
      .collect(),
  )
}
