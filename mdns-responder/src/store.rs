//! Record storage shared by the remote cache (`rrc`) and the local
//! published zone (`rrl`).
//!
//! Grounded on `rrcache.go`'s `rrCache` (the remote-answer cache: `add`,
//! `matchQuestion`, expiry-on-TTL) and `answer.go`'s `answers` (the
//! published-record set: `add`, `matchAnswers`, `matchQuestion`) from the
//! system this engine generalizes. Both are a flat, unordered collection —
//! there is no index beyond linear scan, favoring simple `Vec`-backed
//! structures over premature indices.
use mdns_proto::{Question, ResourceType};

use crate::record::Record;

/// An unordered set of [`Record`]s with dedup-on-identity insertion and
/// linear-scan lookup. One instance backs the remote cache, a second
/// backs the set of locally published records.
#[derive(Debug, Default)]
pub struct RecordStore {
  records: Vec<Record>,
}

impl RecordStore {
  /// An empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of records currently held.
  #[inline]
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// `true` if the store holds no records.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Adds `record`, or refreshes an existing record sharing its identity
  /// in place (resetting its age and TTL to the incoming one, clearing any
  /// accumulated requery count) rather than storing a duplicate. Returns
  /// `true` if this was a brand new record, `false` if an existing one was
  /// refreshed — the caller uses this to decide whether to fire a
  /// `ServiceAdded`-style notification versus a plain `ServiceUpdated` one.
  pub fn add(&mut self, record: Record) -> bool {
    if let Some(existing) = self
      .records
      .iter_mut()
      .find(|r| r.same_identity(&record))
    {
      existing.ttl = record.ttl;
      existing.created = record.created;
      existing.requery_count = 0;
      existing.last_query_at = None;
      false
    } else {
      self.records.push(record);
      true
    }
  }

  /// Removes every record matching `predicate`, returning them. Used both
  /// for a caller-initiated withdrawal (goodbye packet) and for
  /// TTL-expiry sweeps.
  pub fn remove_where(&mut self, mut predicate: impl FnMut(&Record) -> bool) -> Vec<Record> {
    let (removed, kept) = std::mem::take(&mut self.records)
      .into_iter()
      .partition(|r| predicate(r));
    self.records = kept;
    removed
  }

  /// Drops every record whose TTL has fully elapsed, returning them so the
  /// caller can notify any attached listeners of their removal (mirrors
  /// `rrCache`'s passive expiry: there is no proactive eviction beyond
  /// TTL, per the original source this engine supplements from).
  pub fn expire(&mut self) -> Vec<Record> {
    self.remove_where(Record::is_expired)
  }

  /// All records whose owner name/type/class answer `question` (ignores
  /// `if_index`; callers filter separately when interface scoping
  /// matters), mirroring `matchQuestion`.
  pub fn match_question<'a>(&'a self, question: &'a Question<'a>) -> impl Iterator<Item = &'a Record> {
    self.records.iter().filter(move |r| r.matches_question(question))
  }

  /// All records of `ty` (or every record, for [`ResourceType::Wildcard`])
  /// owned by `name`, case-insensitively, regardless of interface.
  pub fn by_name_and_type<'a>(
    &'a self,
    name: &'a crate::record::Name,
    ty: ResourceType,
  ) -> impl Iterator<Item = &'a Record> {
    self
      .records
      .iter()
      .filter(move |r| &r.name == name && (ty == ResourceType::Wildcard || r.ty() == ty))
  }

  /// Iterates over every record currently held, e.g. for the Lifetime
  /// Manager's periodic scan.
  pub fn iter(&self) -> impl Iterator<Item = &Record> {
    self.records.iter()
  }

  /// Iterates mutably, e.g. so the Lifetime Manager can stamp
  /// `last_query_at`/`requery_count` in place.
  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> {
    self.records.iter_mut()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rdata::Rdata;
  use crate::record::{Kind, Name};
  use std::net::Ipv4Addr;

  fn a_record(name: &str, ttl: u32) -> Record {
    Record::new(0, Name::new(name), Kind::Unique, Rdata::A(Ipv4Addr::new(127, 0, 0, 1)), ttl)
  }

  #[test]
  fn add_dedups_by_identity_and_refreshes_in_place() {
    let mut store = RecordStore::new();
    assert!(store.add(a_record("host.local.", 120)));
    assert_eq!(store.len(), 1);
    assert!(!store.add(a_record("host.local.", 120)));
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn expire_drops_only_stale_records() {
    let mut store = RecordStore::new();
    store.add(a_record("fresh.local.", 120));
    let mut stale = a_record("stale.local.", 1);
    stale.created -= std::time::Duration::from_secs(10);
    store.add(stale);

    let expired = store.expire();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].name.as_str(), "stale.local.");
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn by_name_and_type_is_case_insensitive() {
    let mut store = RecordStore::new();
    store.add(a_record("Host.Local.", 120));
    let matches: Vec<_> = store
      .by_name_and_type(&Name::new("host.local."), ResourceType::A)
      .collect();
    assert_eq!(matches.len(), 1);
  }
}
