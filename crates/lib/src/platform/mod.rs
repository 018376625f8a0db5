pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;
pub use os::Os;

/// Platform a package is evaluated for, e.g. `x86_64-linux`.
///
/// Serialized as its triple string, which is also the form the catalog's
/// attribute paths use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct System {
  pub arch: Arch,
  pub os: Os,
}

/// Platform triple that names no supported arch-os pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized platform triple '{0}'")]
pub struct ParseSystemError(pub String);

impl System {
  /// Create a platform identifier from its components.
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime.
  ///
  /// Returns `None` if the OS or architecture is not supported.
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Parse a platform triple such as `aarch64-darwin`.
  pub fn parse(s: &str) -> Result<Self, ParseSystemError> {
    let invalid = || ParseSystemError(s.to_string());
    let (arch, os) = s.split_once('-').ok_or_else(invalid)?;
    Ok(Self {
      arch: Arch::parse(arch).ok_or_else(invalid)?,
      os: Os::parse(os).ok_or_else(invalid)?,
    })
  }
}

impl fmt::Display for System {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.arch, self.os)
  }
}

impl FromStr for System {
  type Err = ParseSystemError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for System {
  type Error = ParseSystemError;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    Self::parse(&s)
  }
}

impl From<System> for String {
  fn from(system: System) -> Self {
    system.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn triple_format_is_arch_os() {
    let system = System::new(Arch::Aarch64, Os::Darwin);
    assert_eq!(system.to_string(), "aarch64-darwin");

    let system = System::new(Arch::X86_64, Os::Linux);
    assert_eq!(system.to_string(), "x86_64-linux");
  }

  #[test]
  fn parse_accepts_supported_triples() {
    for triple in ["x86_64-linux", "aarch64-linux", "x86_64-darwin", "aarch64-darwin"] {
      assert_eq!(System::parse(triple).unwrap().to_string(), triple);
    }
  }

  #[test]
  fn parse_rejects_malformed_triples() {
    assert!(System::parse("x86_64").is_err());
    assert!(System::parse("x86_64-windows").is_err());
    assert!(System::parse("sparc-linux").is_err());
    assert!(System::parse("").is_err());
  }

  #[test]
  fn serializes_as_triple_string() {
    let system = System::new(Arch::X86_64, Os::Linux);
    assert_eq!(serde_json::to_string(&system).unwrap(), "\"x86_64-linux\"");

    let parsed: System = serde_json::from_str("\"aarch64-darwin\"").unwrap();
    assert_eq!(parsed, System::new(Arch::Aarch64, Os::Darwin));
  }
}
