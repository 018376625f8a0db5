use std::fmt;

/// Operating system component of a platform triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  Darwin,
}

impl Os {
  /// Detect the current operating system at runtime.
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      _ => None,
    }
  }

  /// Parse the triple identifier of an operating system.
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "linux" => Some(Self::Linux),
      "darwin" => Some(Self::Darwin),
      _ => None,
    }
  }

  /// Returns the lowercase identifier used in platform triples.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
