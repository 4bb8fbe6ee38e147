//! Record probing and announcement: turns a single `register` call into
//! RFC 6762's probe-then-announce sequence.
//!
//! Grounded in `registrar.go`'s `CreateRecordRegistrar`/`RegisterRecord`: a
//! [`Kind::Unique`] record is probed three times at a 250ms timeout via the
//! same outstanding-question machinery a caller's own query uses
//! ([`Command::Ask`] with a [`Listener::Probe`] instead of a
//! [`Listener::Query`]); any record matching the probed name that does not
//! carry the same data is a conflict. Once probing clears (or the record
//! is [`Kind::Shared`] and skips probing outright), the record is announced
//! eight times with the original's exponential backoff (0, 20, 40, ...,
//! 1280ms) before settling into the Lifetime Manager's own refresh
//! schedule. Dropping the returned [`Canceller`] (or calling
//! [`Canceller::cancel`] on it) sends a goodbye packet and withdraws the
//! record.
use core::time::Duration;

use agnostic_net::runtime::RuntimeLite;
use async_channel::Sender;
use futures::FutureExt;

use crate::{
  engine::Command,
  error::{Error, Result},
  question::{Listener, Question},
  record::{Kind, Record},
  scope::{Canceller, Scope},
};

const PROBE_ATTEMPTS: u32 = 3;
const PROBE_TIMEOUT: Duration = Duration::from_millis(250);
const ANNOUNCE_STEPS: u32 = 8;
const INITIAL_ANNOUNCE_DELAY: Duration = Duration::from_millis(20);

/// Registers `record` with the core loop reachable via `cmd_tx`, probing
/// first if it is [`Kind::Unique`], then announcing it with the
/// exponential backoff described above. Returns once the record has been
/// accepted — immediately for a [`Kind::Shared`] record, or after probing
/// clears for a [`Kind::Unique`] one — while the remaining announce steps
/// and the eventual goodbye-on-cancel continue in the background.
pub async fn register<R: RuntimeLite>(cmd_tx: Sender<Command>, record: Record) -> Result<Canceller> {
  let (canceller, scope) = Canceller::new();
  let record = record.with_owner(scope.clone());

  if record.kind == Kind::Unique {
    probe::<R>(&cmd_tx, &record).await?;
  }

  let _ = cmd_tx.send(Command::Publish { record: record.clone() }).await;

  R::spawn_detach(announce_remaining::<R>(cmd_tx, record, scope));

  Ok(canceller)
}

/// Sends three probe queries 250ms apart, watching for a conflicting
/// answer. A matching record whose data differs from `record`'s own is a
/// conflict per RFC 6762 §8.1; a matching record with identical data is
/// this same registration having already gone out (e.g. a previous
/// process instance) and is not a conflict.
async fn probe<R: RuntimeLite>(cmd_tx: &Sender<Command>, record: &Record) -> Result<()> {
  let (tx, rx) = async_channel::unbounded();
  let question = Question::new(record.if_index, record.name.clone(), record.ty());
  let (probe_canceller, probe_scope) = Canceller::new();

  for attempt in 0..PROBE_ATTEMPTS {
    if attempt == 0 {
      let _ = cmd_tx
        .send(Command::Ask {
          question: question.clone(),
          scope: Some(probe_scope.clone()),
          listener: Listener::Probe(tx.clone()),
        })
        .await;
    } else {
      let _ = cmd_tx
        .send(Command::Requery {
          question: question.clone(),
        })
        .await;
    }

    futures::select! {
      conflicting = rx.recv().fuse() => {
        if let Ok(conflicting) = conflicting {
          if !conflicting.same_identity(record) {
            probe_canceller.cancel();
            return Err(Error::PublishConflict(smol_str::SmolStr::new(record.name.as_str())));
          }
        }
      }
      _ = R::sleep(PROBE_TIMEOUT).fuse() => {}
    }
  }

  probe_canceller.cancel();
  Ok(())
}

/// Drives the remaining seven announce steps (the first already went out
/// in [`register`]) and, once `scope` is cancelled, sends the goodbye
/// withdrawal.
async fn announce_remaining<R: RuntimeLite>(cmd_tx: Sender<Command>, record: Record, scope: Scope) {
  let mut delay = INITIAL_ANNOUNCE_DELAY;

  for _ in 1..ANNOUNCE_STEPS {
    futures::select! {
      _ = scope.cancelled().fuse() => {
        withdraw(&cmd_tx, &record).await;
        return;
      }
      _ = R::sleep(delay).fuse() => {}
    }
    let _ = cmd_tx.send(Command::Publish { record: record.clone() }).await;
    delay *= 2;
  }

  scope.cancelled().await;
  withdraw(&cmd_tx, &record).await;
}

async fn withdraw(cmd_tx: &Sender<Command>, record: &Record) {
  let _ = cmd_tx
    .send(Command::Withdraw {
      if_index: record.if_index,
      name: record.name.clone(),
      ty: record.ty(),
    })
    .await;
}
