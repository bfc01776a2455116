use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier for a door.
///
/// Defined by the door's configuration key, i.e. [doors.identifier-here]
#[derive(Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord, Clone)]
#[serde(transparent)]
pub struct Identifier(pub String);

impl From<String> for Identifier {
  fn from(string: String) -> Self {
    Identifier(string)
  }
}

impl From<&str> for Identifier {
  fn from(string: &str) -> Self {
    Identifier(string.to_string())
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
