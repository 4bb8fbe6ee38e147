//! Public API surface: the caller-facing [`Handle`] and the flag bits
//! that qualify its operations.
//!
//! Grounded in `browse.go`/`resolve.go`/`register.go`/`query.go`/
//! `domains.go` from the system this engine generalizes: one long-lived
//! handle per responder instance, each operation (`query`/`browse`/
//! `resolve`/`register`/`enumerate_domains`) submitting a [`Command`] to
//! the core loop and returning a stream (or, for `register`, a
//! [`Canceller`]) rather than a raw channel, so a caller never needs to
//! know about [`crate::question::Listener`] or [`crate::engine::Command`]
//! directly.
use core::{
  pin::Pin,
  task::{Context, Poll},
};

use agnostic_net::runtime::RuntimeLite;
use async_channel::{Receiver, Sender};
use bitflags::bitflags;
use futures::{FutureExt, Stream};
use mdns_proto::ResourceType;
use smol_str::{SmolStr, format_smolstr};

use crate::{
  engine::{Command, Core},
  error::{Error, Result},
  question::{Listener, QueryEvent, Question},
  rdata::{PTR, Rdata},
  record::{Kind, Name, Record},
  registrar,
  scope::Canceller,
  transport::Transport,
};

/// The only domain this responder ever resolves or browses under: mDNS is
/// inherently a `.local` protocol, so [`Handle::enumerate_domains`]
/// answers synchronously with this constant rather than issuing a
/// network query (see `domains.go`'s `getOwnDomainname` stub).
const LOCAL_DOMAIN: &str = "local.";

bitflags! {
  /// Mirrors `flags.go`'s bit assignments exactly, so a caller porting
  /// code from the system this crate generalizes can reuse the same
  /// numeric values.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct Flags: u32 {
    /// More records from the same batch are queued right behind this one.
    const MORE_COMING = 1 << 0;
    /// The record/service was added (as opposed to removed).
    const ADD = 1 << 1;
    /// Use the default domain.
    const DEFAULT = 1 << 2;
    /// Do not automatically rename on a name conflict; report it instead.
    const NO_AUTO_RENAME = 1 << 3;
    /// The record may coexist with others sharing its name.
    const SHARED = 1 << 4;
    /// The record's owner name must be unique on the network.
    const UNIQUE = 1 << 5;
    /// Enumerate browsing domains rather than registration domains.
    const BROWSE_DOMAINS = 1 << 6;
    /// Enumerate registration domains rather than browsing domains.
    const REGISTRATION_DOMAINS = 1 << 7;
    /// A record was added to the result set (vs. removed from it).
    const RECORD_ADDED = 1 << 8;
  }
}

/// A running query/browse/resolve/domain-enumeration: a [`Stream`] of
/// matching records that keeps the underlying question alive for as long
/// as it (or a clone of its [`Canceller`]) is held, and withdraws it once
/// dropped.
pub struct Operation {
  rx: Receiver<QueryEvent>,
  _scope: Canceller,
}

impl Operation {
  /// Waits for the next matching record, or `None` once the core loop
  /// has shut down.
  pub async fn recv(&self) -> Option<QueryEvent> {
    self.rx.recv().await.ok()
  }
}

impl Stream for Operation {
  type Item = QueryEvent;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    Pin::new(&mut self.get_mut().rx).poll_next(cx)
  }
}

/// A single Browse answer, decomposed at the dot boundaries per §4.8:
/// `<serviceName>.<regType>.<domain>.` split back into its three parts.
#[derive(Debug, Clone)]
pub struct BrowseEvent {
  pub service_name: Name,
  pub reg_type: Name,
  pub domain: Name,
  pub flags: Flags,
}

/// Splits a PTR target name of the form `<instance>.<service>.<proto>.<domain>.`
/// into `(instance, "<service>.<proto>", domain)`. Returns `None` for a name
/// with too few labels to contain a service type at all.
fn decompose_instance_name(name: &str) -> Option<(SmolStr, SmolStr, SmolStr)> {
  let trimmed = name.trim_end_matches('.');
  let labels: Vec<&str> = trimmed.split('.').collect();
  if labels.len() < 3 {
    return None;
  }
  let service_name = SmolStr::new(labels[0]);
  let reg_type = format_smolstr!("{}.{}", labels[1], labels[2]);
  let domain = if labels.len() > 3 {
    format_smolstr!("{}.", labels[3..].join("."))
  } else {
    SmolStr::new(LOCAL_DOMAIN)
  };
  Some((service_name, reg_type, domain))
}

fn decompose_ptr_answer(event: QueryEvent) -> Option<BrowseEvent> {
  let target = match &event.record.data {
    Rdata::Ptr(ptr) => ptr.name(),
    _ => return None,
  };
  let (service_name, reg_type, domain) = decompose_instance_name(target)?;
  Some(BrowseEvent {
    service_name: Name::new(service_name),
    reg_type: Name::new(reg_type),
    domain: Name::new(domain),
    flags: event.flags,
  })
}

/// A running Browse: like [`Operation`], but yields each PTR answer
/// already decomposed into `(serviceName, regType, domain)`.
pub struct BrowseOperation {
  inner: Operation,
}

impl BrowseOperation {
  /// Waits for the next decomposed Browse answer.
  pub async fn recv(&self) -> Option<BrowseEvent> {
    loop {
      let event = self.inner.recv().await?;
      if let Some(decomposed) = decompose_ptr_answer(event) {
        return Some(decomposed);
      }
    }
  }
}

impl Stream for BrowseOperation {
  type Item = BrowseEvent;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    loop {
      match Pin::new(&mut this.inner).poll_next(cx) {
        Poll::Ready(Some(event)) => {
          if let Some(decomposed) = decompose_ptr_answer(event) {
            return Poll::Ready(Some(decomposed));
          }
        }
        Poll::Ready(None) => return Poll::Ready(None),
        Poll::Pending => return Poll::Pending,
      }
    }
  }
}

/// A paired SRV+TXT Resolve answer, emitted once both halves of a
/// service instance's records have been seen at least once, and again on
/// every subsequent update to either (§4.8: "invoke the user callback
/// when both are present, re-invoking on each subsequent update").
#[derive(Debug, Clone)]
pub struct ResolveEvent {
  pub srv: Record,
  pub txt: Record,
}

/// A running Resolve: queries `SRV` and `TXT` for the same instance name
/// and buffers the latest of each, since the two record types are never
/// guaranteed to arrive (or update) together.
pub struct ResolveOperation {
  srv: Operation,
  txt: Operation,
  last_srv: Option<Record>,
  last_txt: Option<Record>,
}

impl ResolveOperation {
  /// Waits until both an SRV and a TXT record have been seen, then
  /// yields the pair; called again, waits for the next update to either.
  pub async fn recv(&mut self) -> Option<ResolveEvent> {
    loop {
      futures::select! {
        srv = self.srv.recv().fuse() => {
          self.last_srv = Some(srv?.record);
        }
        txt = self.txt.recv().fuse() => {
          self.last_txt = Some(txt?.record);
        }
      }
      if let (Some(srv), Some(txt)) = (&self.last_srv, &self.last_txt) {
        return Some(ResolveEvent {
          srv: srv.clone(),
          txt: txt.clone(),
        });
      }
    }
  }
}

/// A handle onto one running responder instance. Cheap to clone; every
/// clone shares the same core loop.
pub struct Handle<R> {
  cmd_tx: Sender<Command>,
  _rt: core::marker::PhantomData<fn() -> R>,
}

impl<R> Clone for Handle<R> {
  fn clone(&self) -> Self {
    Self {
      cmd_tx: self.cmd_tx.clone(),
      _rt: core::marker::PhantomData,
    }
  }
}

impl<R: RuntimeLite> Handle<R> {
  /// Binds the transport and spawns the core loop, returning a handle to
  /// it. The loop keeps running, detached, until every [`Handle`] clone
  /// is dropped.
  pub async fn new() -> Result<Self> {
    Self::with_options(&crate::ServerOptions::default()).await
  }

  /// Like [`new`](Self::new), binding each family's multicast interface
  /// from `opts` and honoring `opts.log_empty_responses()`.
  pub async fn with_options(opts: &crate::ServerOptions) -> Result<Self> {
    let transport = Transport::<R>::bind_with(opts).await.map_err(Error::TransportInit)?;
    let (cmd_tx, cmd_rx) = async_channel::unbounded();
    let core = Core::with_options(transport, cmd_rx, opts);
    R::spawn_detach(core.run());
    Ok(Self {
      cmd_tx,
      _rt: core::marker::PhantomData,
    })
  }

  async fn ask(&self, question: Question) -> Operation {
    let (tx, rx) = async_channel::unbounded();
    let (canceller, scope) = Canceller::new();
    let _ = self
      .cmd_tx
      .send(Command::Ask {
        question,
        scope: Some(scope),
        listener: Listener::Query(tx),
      })
      .await;
    Operation { rx, _scope: canceller }
  }

  /// The general form every other query shorthand below is built on:
  /// asks `if_index` about `(name, ty)`, `ResourceType::Wildcard`
  /// included.
  pub async fn query(&self, if_index: i32, name: impl Into<Name>, ty: ResourceType) -> Operation {
    self.ask(Question::new(if_index, name.into(), ty)).await
  }

  /// Browses for instances of `service_type` (a PTR query), e.g.
  /// `"_http._tcp.local."`. Each answer is decomposed at the dot
  /// boundaries into `(serviceName, regType, domain)`.
  pub async fn browse(&self, if_index: i32, service_type: impl Into<Name>) -> BrowseOperation {
    let inner = self.query(if_index, service_type, ResourceType::Ptr).await;
    BrowseOperation { inner }
  }

  /// Resolves a specific service instance: queries both `SRV` and `TXT`
  /// for `instance`, yielding a pair once both have been seen and again
  /// on each subsequent update to either.
  pub async fn resolve(&self, if_index: i32, instance: impl Into<Name>) -> ResolveOperation {
    let instance = instance.into();
    let srv = self.query(if_index, instance.clone(), ResourceType::Srv).await;
    let txt = self.query(if_index, instance, ResourceType::Txt).await;
    ResolveOperation {
      srv,
      txt,
      last_srv: None,
      last_txt: None,
    }
  }

  /// Enumerates browsing or registration domains per RFC 6763 §11. This
  /// responder only ever knows of one domain, so the answer is
  /// synchronous: exactly one event naming [`LOCAL_DOMAIN`], tagged
  /// [`Flags::ADD`] | [`Flags::DEFAULT`], with no network query issued.
  pub async fn enumerate_domains(&self, _if_index: i32, _domain: &str, _flags: Flags) -> Operation {
    let (tx, rx) = async_channel::unbounded();
    let (canceller, _scope) = Canceller::new();
    let ptr = PTR::new(SmolStr::new(LOCAL_DOMAIN)).expect("\"local.\" is always a valid PTR name");
    let record = Record::new(0, Name::new(LOCAL_DOMAIN), Kind::Shared, Rdata::Ptr(ptr), 0);
    let _ = tx.try_send(QueryEvent {
      record,
      flags: Flags::ADD | Flags::DEFAULT,
    });
    Operation { rx, _scope: canceller }
  }

  /// Registers `data` under `name`, probing first if `kind` is
  /// [`Kind::Unique`]. The returned [`Canceller`] withdraws the record
  /// (and its eventual goodbye packet) once cancelled or dropped.
  pub async fn register(
    &self,
    if_index: i32,
    name: impl Into<Name>,
    kind: Kind,
    data: Rdata,
    ttl: u32,
  ) -> Result<Canceller> {
    let record = Record::new(if_index, name.into(), kind, data, ttl);
    registrar::register::<R>(self.cmd_tx.clone(), record).await
  }
}
