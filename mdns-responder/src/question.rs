//! Outstanding questions and the callbacks attached to them.
//!
//! Mirrors `question.go`'s `questions`/`question` pair from the system this
//! engine generalizes, with the dynamic `interface{}` callback replaced by
//! a small closed enum of [`Listener`] variants (see the design notes in
//! `DESIGN.md` on why a global singleton's loosely-typed callback became an
//! explicit, statically-dispatched one here).
use core::fmt;

use mdns_proto::ResourceType;

use crate::{api::Flags, record::Name, record::Record, scope::Scope};

/// A single outstanding question: "what records answer `(name, ty)`, on
/// this interface?" Two questions are the same question (and so share a
/// single network query and fan out to every attached listener) when their
/// `if_index`, `ty` and case-insensitive `name` all match.
#[derive(Debug, Clone)]
pub struct Question {
  /// `0` for all interfaces, `-1` for loopback only, otherwise a concrete
  /// OS interface index.
  pub if_index: i32,
  /// The name being asked about.
  pub name: Name,
  /// The record type being asked about. `Wildcard` answers any type.
  pub ty: ResourceType,
  /// The question's class, always [`crate::record::CLASS_IN`] for
  /// anything this crate originates.
  pub class: u16,
}

impl Question {
  /// Builds a new question for `name`/`ty` on `if_index`.
  pub fn new(if_index: i32, name: Name, ty: ResourceType) -> Self {
    Self {
      if_index,
      name,
      ty,
      class: crate::record::CLASS_IN,
    }
  }

  /// Whether `self` and `other` represent the same outstanding question
  /// (ignores listeners; used to find-or-create entries in the registry).
  fn same_question(&self, other: &Self) -> bool {
    self.if_index == other.if_index && self.ty == other.ty && self.name == other.name
  }

  /// Whether `record` answers this question.
  pub fn matches(&self, record: &Record) -> bool {
    (self.if_index == 0 || self.if_index == record.if_index)
      && (self.ty == record.ty() || self.ty == ResourceType::Wildcard)
      && self.name == record.name
  }
}

/// A record delivered to a listener in response to a matching question.
#[derive(Debug, Clone)]
pub struct QueryEvent {
  /// The matching record.
  pub record: Record,
  /// `Flags::MORE_COMING` is set when the dispatcher knows further
  /// records from the same batch are queued right behind this one.
  pub flags: Flags,
}

/// Where a matched record is delivered. A question can have any number of
/// listeners attached (e.g. two overlapping `Browse` calls for the same
/// service type share one outstanding PTR question).
#[derive(Clone)]
pub enum Listener {
  /// A caller-facing query/browse/resolve stream.
  Query(async_channel::Sender<QueryEvent>),
  /// The [`crate::registrar::Registrar`]'s probe response channel: any
  /// record matching the probed name is a conflict signal.
  Probe(async_channel::Sender<Record>),
}

impl fmt::Debug for Listener {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Query(_) => f.write_str("Listener::Query(..)"),
      Self::Probe(_) => f.write_str("Listener::Probe(..)"),
    }
  }
}

impl Listener {
  /// Delivers a matched record, dropping silently if the receiver has
  /// gone away (the listener will be pruned on the next sweep). Called
  /// only from a [`crate::dispatch::Dispatcher`] worker task, never from
  /// the core loop directly.
  pub(crate) fn deliver(&self, record: Record) {
    match self {
      Self::Query(tx) => {
        let _ = tx.try_send(QueryEvent {
          record,
          flags: Flags::empty(),
        });
      }
      Self::Probe(tx) => {
        let _ = tx.try_send(record);
      }
    }
  }

  /// `true` once the channel behind this listener has been dropped/closed.
  fn is_closed(&self) -> bool {
    match self {
      Self::Query(tx) => tx.is_closed(),
      Self::Probe(tx) => tx.is_closed(),
    }
  }
}

struct Entry {
  question: Question,
  scope: Option<Scope>,
  listeners: Vec<Listener>,
}

/// Tracks every outstanding question and fans out matching records to the
/// listeners attached to it, the way `questions`/`question` do in the
/// system this engine generalizes.
#[derive(Default)]
pub struct QuestionRegistry {
  entries: Vec<Entry>,
}

impl QuestionRegistry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Finds an existing entry for `question`, or creates one. Returns
  /// whether the question was newly created (the caller uses this to
  /// decide whether a network query needs to be sent at all, matching
  /// `runQuery`'s `cq == nil` branch).
  pub fn find_or_create(&mut self, question: Question, scope: Option<Scope>) -> (usize, bool) {
    if let Some(idx) = self
      .entries
      .iter()
      .position(|e| e.question.same_question(&question))
    {
      return (idx, false);
    }
    self.entries.push(Entry {
      question,
      scope,
      listeners: Vec::new(),
    });
    (self.entries.len() - 1, true)
  }

  /// Attaches `listener` to the entry at `idx`, no-op if already attached.
  pub fn attach(&mut self, idx: usize, listener: Listener) {
    if let Some(entry) = self.entries.get_mut(idx) {
      entry.listeners.push(listener);
    }
  }

  /// Returns `true` if there is a live, non-cancelled question matching
  /// `if_index`/`ty`/`name`.
  pub fn is_active(&self, if_index: i32, ty: ResourceType, name: &Name) -> bool {
    self.entries.iter().any(|e| {
      e.question.if_index == if_index
        && e.question.ty == ty
        && &e.question.name == name
        && e.scope.as_ref().is_none_or(|s| !s.is_cancelled())
    })
  }

  /// Returns every listener attached to an entry whose question `record`
  /// answers (mirrors `cq != nil` in `handleResponseRecords`'s match
  /// step). Does not deliver anything itself: the caller hands each
  /// listener to [`crate::dispatch::Dispatcher`], which is the only thing
  /// allowed to invoke [`Listener::deliver`] — see that module's docs for
  /// why this can't happen here, inline in the core loop.
  pub fn matching_listeners(&self, record: &Record) -> Vec<Listener> {
    self
      .entries
      .iter()
      .filter(|entry| entry.question.matches(record))
      .flat_map(|entry| entry.listeners.iter().cloned())
      .collect()
  }

  /// Drops listeners whose receivers have gone away and entries whose
  /// scope was cancelled or which ended up with no listeners left. Called
  /// once per core-loop tick, a periodic sweep for closed connections.
  pub fn prune(&mut self) {
    self.entries.retain_mut(|entry| {
      entry.listeners.retain(|l| !l.is_closed());
      let scope_alive = entry.scope.as_ref().is_none_or(|s| !s.is_cancelled());
      scope_alive && !entry.listeners.is_empty()
    });
  }

  /// Iterates over every currently active question, e.g. for the Lifetime
  /// Manager to decide which ones are due for a maintenance requery.
  pub fn iter(&self) -> impl Iterator<Item = &Question> {
    self.entries.iter().map(|e| &e.question)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    rdata::Rdata,
    record::{Kind, Record},
  };
  use std::net::Ipv4Addr;

  fn a_record(name: &str) -> Record {
    Record::new(
      0,
      Name::new(name),
      Kind::Unique,
      Rdata::A(Ipv4Addr::new(10, 0, 0, 1)),
      120,
    )
  }

  #[test]
  fn find_or_create_dedups_by_interface_type_and_name() {
    let mut reg = QuestionRegistry::new();
    let q1 = Question::new(0, Name::new("foo.local."), ResourceType::A);
    let q2 = Question::new(0, Name::new("FOO.LOCAL."), ResourceType::A);
    let (idx1, created1) = reg.find_or_create(q1, None);
    let (idx2, created2) = reg.find_or_create(q2, None);
    assert!(created1);
    assert!(!created2);
    assert_eq!(idx1, idx2);
  }

  #[test]
  fn matching_listeners_returns_every_attached_listener() {
    let mut reg = QuestionRegistry::new();
    let q = Question::new(0, Name::new("foo.local."), ResourceType::A);
    let (idx, _) = reg.find_or_create(q, None);
    let (tx1, _rx1) = async_channel::unbounded();
    let (tx2, _rx2) = async_channel::unbounded();
    reg.attach(idx, Listener::Query(tx1));
    reg.attach(idx, Listener::Query(tx2));

    let listeners = reg.matching_listeners(&a_record("foo.local."));
    assert_eq!(listeners.len(), 2);

    assert!(reg.matching_listeners(&a_record("bar.local.")).is_empty());
  }

  #[test]
  fn prune_drops_entries_once_scope_cancelled() {
    let mut reg = QuestionRegistry::new();
    let (canceller, scope) = crate::scope::Canceller::new();
    let q = Question::new(0, Name::new("foo.local."), ResourceType::A);
    let (idx, _) = reg.find_or_create(q, Some(scope));
    let (tx, _rx) = async_channel::unbounded();
    reg.attach(idx, Listener::Query(tx));

    reg.prune();
    assert_eq!(reg.iter().count(), 1);

    canceller.cancel();
    reg.prune();
    assert_eq!(reg.iter().count(), 0);
  }
}
