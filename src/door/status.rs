//! Scraping the door state out of the controller's plain-text status page.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::state::DoorState;

static STATUS_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)Door Status:\s*([A-Za-z]+)").expect("status pattern is a valid regex"));

/// The response did not contain a `Door Status: <word>` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not parse door status from response")]
pub struct ParseFailure;

/// Find the first `Door Status: <word>` in `text`.
///
/// A word other than open/closed is still a reading, just of an unknown position.
pub fn parse(text: &str) -> Result<DoorState, ParseFailure> {
  let token = STATUS_PATTERN
    .captures(text)
    .and_then(|captures| captures.get(1))
    .map(|word| word.as_str().to_uppercase())
    .ok_or(ParseFailure)?;

  let state = DoorState::from_token(&token);
  if state == DoorState::Unknown {
    log::debug!("Unrecognised door status token: {token}");
  }
  Ok(state)
}
