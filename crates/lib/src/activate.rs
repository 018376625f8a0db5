//! Activation script staging and composition.
//!
//! Hook scripts are staged into the fixed `activate` subdirectory of a
//! scripts directory. The composed activation text references each staged
//! script relative to the `$FLOX_ENV` environment root, so it stays valid
//! when the environment is relocated or reached through a symlink.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::manifest::InvocationMode;

/// Name of the subdirectory all hook scripts are staged into.
pub const ACTIVATION_SUBDIR: &str = "activate";

/// Environment-root variable the composed script resolves paths against.
pub const ENV_ROOT_VAR: &str = "FLOX_ENV";

/// Prologue of the bash activation profile. Sourced via `--rcfile`, which
/// skips `~/.bashrc`, so profile.d scripts are picked up here.
const BASH_PROLOGUE: &str = r#"if [ -d "$FLOX_ENV/etc/profile.d" ]; then
  declare -a _prof_scripts;
  _prof_scripts=( $(
    shopt -s nullglob;
    echo "$FLOX_ENV/etc/profile.d"/*.sh;
  ) );
  for p in "${_prof_scripts[@]}"; do . "$p"; done
  unset _prof_scripts;
fi

# Newly linked packages must be found without re-hashing the command table.
set +h
"#;

/// Prologue of the zsh activation profile, called from the user's rcfile.
const ZSH_PROLOGUE: &str = r#"if [ -d "$FLOX_ENV/etc/profile.d" ]; then
  declare -a _prof_scripts;
  _prof_scripts=( $(
    echo "$FLOX_ENV/etc/profile.d"/*.sh;
  ) );
  for p in "${_prof_scripts[@]}"; do . "$p"; done
  unset _prof_scripts;
fi

# Newly linked packages must be found without re-hashing the command table.
setopt nohashcmds
setopt nohashdirs
"#;

/// Filesystem failure while staging a hook script.
#[derive(Debug, Error)]
pub enum StagingError {
  #[error("failed to create activation directory '{path}'")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write staged script '{path}'")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to mark staged script '{path}' executable")]
  Permissions {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Write a hook script to `<scripts_dir>/activate/<name>` and return the
/// staged path.
///
/// Creating the subdirectory is part of staging and idempotent. Staging the
/// same name twice is last-write-wins; there are no merge semantics.
pub fn stage_script(scripts_dir: &Path, name: &str, contents: &str) -> Result<PathBuf, StagingError> {
  let subdir = scripts_dir.join(ACTIVATION_SUBDIR);
  fs::create_dir_all(&subdir).map_err(|source| StagingError::CreateDir {
    path: subdir.clone(),
    source,
  })?;

  let staged_path = subdir.join(name);
  debug!(script = name, path = %staged_path.display(), "staging activation script");

  // Write to a tempfile in the same directory and move it into place, so a
  // concurrent reader never observes a half-written script.
  let write_err = |source: io::Error| StagingError::Write {
    path: staged_path.clone(),
    source,
  };
  let mut tmp = NamedTempFile::new_in(&subdir).map_err(write_err)?;
  tmp.write_all(contents.as_bytes()).map_err(write_err)?;
  tmp.persist(&staged_path).map_err(|err| write_err(err.error))?;

  set_executable(&staged_path)?;

  Ok(staged_path)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), StagingError> {
  use std::os::unix::fs::PermissionsExt;

  let perm_err = |source: io::Error| StagingError::Permissions {
    path: path.to_path_buf(),
    source,
  };
  let mut perms = fs::metadata(path).map_err(perm_err)?.permissions();
  perms.set_mode(perms.mode() | 0o100);
  fs::set_permissions(path, perms).map_err(perm_err)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), StagingError> {
  Ok(())
}

/// Accumulates the composed activation script.
///
/// Composition is append-only and order-preserving: the Nth
/// [`append`](Self::append) produces the Nth hook statement. Exports render
/// before hook statements so hooks observe the environment variables.
#[derive(Debug, Default, Clone)]
pub struct ActivationScript {
  exports: String,
  hooks: String,
}

impl ActivationScript {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append an `export NAME='value'` statement.
  ///
  /// The value is single-quoted with `'` escaped as `'\''`, so it cannot
  /// expand at activation time.
  pub fn export_var(&mut self, name: &str, value: &str) {
    self
      .exports
      .push_str(&format!("export {}='{}'\n", name, escape_single_quotes(value)));
  }

  /// Append the statement wiring one staged hook script in.
  ///
  /// Sourced scripts run in the activating shell; execed scripts run as a
  /// separate process.
  pub fn append(&mut self, name: &str, mode: InvocationMode) {
    let verb = match mode {
      InvocationMode::Sourced => "source",
      InvocationMode::Execed => "bash",
    };
    self
      .hooks
      .push_str(&format!("{verb} \"${ENV_ROOT_VAR}/{ACTIVATION_SUBDIR}/{name}\"\n"));
  }

  /// Render the composed activation text.
  pub fn render(&self) -> String {
    format!("{}{}", self.exports, self.hooks)
  }
}

/// `'` becomes `'\''` so a value cannot break out of its single quotes.
fn escape_single_quotes(value: &str) -> String {
  value.replace('\'', "'\\''")
}

/// Write the per-shell activation profiles, `activate/bash` and
/// `activate/zsh`.
///
/// Each profile is the shell-specific prologue followed by the composed
/// activation text, so sourcing the profile performs the full activation.
pub fn write_shell_profiles(scripts_dir: &Path, script: &ActivationScript) -> Result<(), StagingError> {
  let body = script.render();
  for (shell, prologue) in [("bash", BASH_PROLOGUE), ("zsh", ZSH_PROLOGUE)] {
    let contents = format!("{prologue}\n{body}");
    stage_script(scripts_dir, shell, &contents)?;
  }
  Ok(())
}
