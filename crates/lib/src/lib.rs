//! buildenv-lib: Realize a package manifest into an activatable environment.
//!
//! This crate turns an already-resolved environment manifest into concrete
//! outputs:
//! - `eval`: evaluate each package against an external catalog and classify
//!   the outcome (store path, insecure, unsupported platform, or opaque
//!   failure)
//! - `activate`: stage hook scripts and compose the activation script that
//!   wires them into the user's shell
//! - `realize`: orchestrate evaluation, staging, and composition across a
//!   full manifest
//!
//! The catalog itself (locking, attribute evaluation, the store) is an
//! external collaborator reached through the traits in `catalog`.

pub mod activate;
pub mod catalog;
pub mod eval;
pub mod manifest;
pub mod platform;
pub mod realize;
pub mod store;
