//! Caller-scope cancellation.
//!
//! The system this crate generalizes ties every long-running operation
//! (`Query`, `Browse`, `Register`, ...) to a caller-supplied context that
//! can be cancelled at any time; on cancellation the engine detaches the
//! associated question/listener or, for a published record, sends a
//! goodbye packet (TTL 0) and withdraws it. Rather than depend on a
//! specific async runtime's cancellation token, this follows the same
//! `Sender<()>::close()`-as-broadcast idiom already used for the engine's
//! own shutdown signal: closing the channel wakes every clone of the
//! receiver simultaneously, and `is_cancelled` is a cheap non-blocking
//! check the core loop can poll once per tick.
use async_channel::{Receiver, Sender};

/// A cancellable scope handed out to callers and cloned into every
/// internal structure (questions, listeners, published records) that must
/// react to it.
///
/// Cloning a [`Scope`] is cheap and shares the same underlying cancellation
/// signal; dropping the last [`Canceller`] has the same effect as calling
/// [`Canceller::cancel`] explicitly.
#[derive(Debug, Clone)]
pub struct Scope {
  rx: Receiver<()>,
}

impl Scope {
  /// `true` once this scope has been cancelled.
  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.rx.is_closed()
  }

  /// Resolves once this scope is cancelled. Cheap to poll from a `select!`
  /// alongside other event sources in the core loop.
  #[inline]
  pub async fn cancelled(&self) {
    // The sender is never used to send a value, only closed; recv()
    // resolving at all (Ok or Err) means the scope ended.
    let _ = self.rx.recv().await;
  }
}

/// Owns the cancellation signal for a [`Scope`]. Dropping a [`Canceller`]
/// cancels its scope — a drop-to-cancel idiom rather than an explicit
/// shutdown call.
#[derive(Debug)]
pub struct Canceller {
  tx: Sender<()>,
}

impl Canceller {
  /// Creates a fresh, not-yet-cancelled scope and its controlling handle.
  pub fn new() -> (Self, Scope) {
    let (tx, rx) = async_channel::bounded(1);
    (Self { tx }, Scope { rx })
  }

  /// Cancels the scope. Idempotent: calling this more than once, or
  /// dropping the [`Canceller`] afterwards, has no further effect.
  #[inline]
  pub fn cancel(&self) {
    self.tx.close();
  }

  /// `true` if this canceller's scope has already been cancelled.
  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.tx.is_closed()
  }
}

impl Drop for Canceller {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cancel_is_observable_without_await() {
    let (canceller, scope) = Canceller::new();
    assert!(!scope.is_cancelled());
    canceller.cancel();
    assert!(scope.is_cancelled());
  }

  #[test]
  fn dropping_canceller_cancels_scope() {
    let (canceller, scope) = Canceller::new();
    drop(canceller);
    assert!(scope.is_cancelled());
  }

  #[test]
  fn clones_share_the_same_signal() {
    let (canceller, scope) = Canceller::new();
    let scope2 = scope.clone();
    canceller.cancel();
    assert!(scope.is_cancelled());
    assert!(scope2.is_cancelled());
  }
}
