//! One-shot timers that can be cancelled through the handle returned when scheduling.

use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use tokio::{task::AbortHandle, time};

/// Identifies a single scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Hands out timers with unique tokens
#[derive(Debug, Default)]
pub struct Timers {
  next_token: AtomicU64,
}

impl Timers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run `callback` once `after` has elapsed, unless cancelled first.
  ///
  /// The callback receives the timer's own token.
  pub fn schedule<F>(&self, after: Duration, callback: F) -> TimerHandle
  where
    F: FnOnce(TimerToken) + Send + 'static,
  {
    let token = TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
    let task = tokio::spawn(async move {
      time::sleep(after).await;
      callback(token);
    });

    TimerHandle {
      token,
      abort: task.abort_handle(),
    }
  }
}

#[derive(Debug)]
pub struct TimerHandle {
  token: TimerToken,
  abort: AbortHandle,
}

impl TimerHandle {
  pub fn token(&self) -> TimerToken {
    self.token
  }

  /// Stop the timer from firing. Safe to call repeatedly, or after it already fired.
  pub fn cancel(&self) {
    self.abort.abort();
  }

  /// True once the timer has fired or been cancelled
  pub fn is_finished(&self) -> bool {
    self.abort.is_finished()
  }
}
