use std::fmt;

use serde::Serialize;

/// The door position as reported by the controller's status page
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
  #[serde(rename = "OPEN")]
  Open,
  #[serde(rename = "CLOSED")]
  Closed,
  #[serde(rename = "UNKNOWN")]
  Unknown,
}

impl DoorState {
  /// Map an already uppercased status token
  pub fn from_token(token: &str) -> Self {
    match token {
      "OPEN" => DoorState::Open,
      "CLOSED" => DoorState::Closed,
      _ => DoorState::Unknown,
    }
  }

  /// `Some(true)` if closed, `Some(false)` if open, `None` if the position isn't known.
  pub fn closedness(&self) -> Option<bool> {
    match self {
      DoorState::Open => Some(false),
      DoorState::Closed => Some(true),
      DoorState::Unknown => None,
    }
  }
}

impl fmt::Display for DoorState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DoorState::Open => write!(f, "OPEN"),
      DoorState::Closed => write!(f, "CLOSED"),
      DoorState::Unknown => write!(f, "UNKNOWN"),
    }
  }
}

/// The way the door is assumed to be moving after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Opening,
  Closing,
}

impl Direction {
  /// The state the door should be in once the travel completes
  pub fn end_state(&self) -> DoorState {
    match self {
      Direction::Opening => DoorState::Open,
      Direction::Closing => DoorState::Closed,
    }
  }
}

/// What the door looks like to anyone asking, combining the polled status, the last known
/// position and any assumed travel.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveDoorState {
  /// `None` if the position has never been known
  pub is_closed: Option<bool>,
  pub is_opening: bool,
  pub is_closing: bool,
}

impl fmt::Display for EffectiveDoorState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_opening {
      write!(f, "opening")
    }
    else if self.is_closing {
      write!(f, "closing")
    }
    else {
      match self.is_closed {
        Some(true) => write!(f, "closed"),
        Some(false) => write!(f, "open"),
        None => write!(f, "unknown"),
      }
    }
  }
}
