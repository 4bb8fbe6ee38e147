//! The Listener Dispatcher: hands matched records to listener callbacks
//! off a growable worker pool, never from the core loop itself.
//!
//! Grounded in §5's concurrency model: "Listener callbacks are dispatched
//! on a separate pool of worker tasks fed by an unbuffered handoff
//! channel; if no worker is ready within 1 ms, the dispatcher spawns one
//! more worker (unbounded, but growth is bounded in practice by listener
//! count)." §5 also restricts the core to a single suspension point (its
//! own `select!`), so the unbuffered handoff-and-maybe-grow handshake
//! can't run inline in [`crate::engine::Core`] — it runs in its own
//! driver task instead, fed by an unbounded inbox that the core only
//! ever does a non-blocking send into.
use core::{marker::PhantomData, time::Duration};

use agnostic_net::runtime::RuntimeLite;
use async_channel::{Receiver, Sender};
use futures::FutureExt;

use crate::{question::Listener, record::Record};

/// How long the driver waits for an idle worker to claim a job before
/// spawning a new one.
const WORKER_GRACE_PERIOD: Duration = Duration::from_millis(1);

#[derive(Clone)]
struct Job {
  listener: Listener,
  record: Record,
}

/// Delivers matched records to [`Listener`]s on a pool of worker tasks
/// that grows on demand, so a slow or stalled user callback can never
/// hold up the core loop.
pub struct Dispatcher<R: RuntimeLite> {
  inbox: Sender<Job>,
  _runtime: PhantomData<R>,
}

impl<R: RuntimeLite> Dispatcher<R> {
  /// Spawns the dispatcher's driver task. The worker pool starts empty;
  /// the first job drives the first worker into existence.
  pub fn new() -> Self {
    let (inbox_tx, inbox_rx) = async_channel::unbounded();
    let (worker_tx, worker_rx) = async_channel::bounded(0);

    R::spawn_detach(drive::<R>(inbox_rx, worker_tx, worker_rx));

    Self {
      inbox: inbox_tx,
      _runtime: PhantomData,
    }
  }

  /// Hands `record` off to `listener`. Never suspends: this only enqueues
  /// onto the driver's unbounded inbox, so it is safe to call from the
  /// core loop's synchronous command handlers.
  pub fn dispatch(&self, listener: Listener, record: Record) {
    let _ = self.inbox.try_send(Job { listener, record });
  }
}

impl<R: RuntimeLite> Default for Dispatcher<R> {
  fn default() -> Self {
    Self::new()
  }
}

/// Pulls jobs off the core-facing inbox and hands each one to the worker
/// pool through an unbuffered rendezvous channel, growing the pool
/// whenever no worker claims a job within [`WORKER_GRACE_PERIOD`].
async fn drive<R: RuntimeLite>(inbox: Receiver<Job>, worker_tx: Sender<Job>, worker_rx: Receiver<Job>) {
  while let Ok(job) = inbox.recv().await {
    loop {
      futures::select! {
        res = worker_tx.send(job.clone()).fuse() => {
          match res {
            Ok(()) => break,
            Err(_) => return, // every worker gone: nothing left to feed.
          }
        }
        _ = R::sleep(WORKER_GRACE_PERIOD).fuse() => {
          R::spawn_detach(work::<R>(worker_rx.clone()));
        }
      }
    }
  }
}

/// One worker: claims jobs off the rendezvous channel for as long as it
/// stays alive and hands each straight to [`Listener::deliver`].
async fn work<R: RuntimeLite>(worker_rx: Receiver<Job>) {
  while let Ok(job) = worker_rx.recv().await {
    job.listener.deliver(job.record);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    api::Flags,
    rdata::Rdata,
    record::{Kind, Name},
  };
  use core::net::Ipv4Addr;

  fn a_record(name: &str) -> Record {
    Record::new(0, Name::new(name), Kind::Unique, Rdata::A(Ipv4Addr::new(10, 0, 0, 1)), 120)
  }

  #[test]
  #[cfg(feature = "tokio")]
  fn dispatch_delivers_through_a_worker() {
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .unwrap()
      .block_on(async {
        let dispatcher = Dispatcher::<agnostic_net::runtime::tokio::TokioRuntime>::new();
        let (tx, rx) = async_channel::unbounded();

        dispatcher.dispatch(Listener::Query(tx), a_record("foo.local."));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.record.name.as_str(), "foo.local.");
        assert_eq!(event.flags, Flags::empty());
      });
  }
}
