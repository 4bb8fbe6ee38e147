//! Record identity and the owned [`Record`] type stored in [`RecordStore`]s.
//!
//! [`RecordStore`]: crate::store::RecordStore

use core::{
  fmt,
  hash::{Hash, Hasher},
  time::Duration,
};
use std::time::Instant;

use mdns_proto::{Label, Question, ResourceRecord, ResourceType};
use rand::Rng;
use smol_str::SmolStr;

use crate::rdata::Rdata;

/// Applies RFC 6762 §5.2's anti-synchronization jitter to a base TTL: a
/// uniform 0..2% increase, so identical records on different instances
/// across the LAN don't all requery/expire in lockstep.
fn jittered_ttl(base: u32) -> u32 {
  let spread = (base as u64 * 2) / 100;
  if spread == 0 {
    return base;
  }
  base + rand::thread_rng().gen_range(0..=spread) as u32
}

/// The `IN` DNS class. Every record this crate deals with lives in it.
pub const CLASS_IN: u16 = 1;

/// Top bit of the RR class in a response: "this record is the only one of
/// its kind, flush stale cache entries sharing its name/type/class".
pub const CACHE_FLUSH_BIT: u16 = 0x8000;

/// Top bit of the QCLASS in a question: "a unicast response is preferred".
pub const UNICAST_BIT: u16 = 0x8000;

/// Whether a record may coexist with others sharing its name (PTR-like), or
/// must be the sole owner of its name on the network (SRV/A/AAAA/TXT-like).
///
/// This governs two things downstream: whether the cache-flush bit is set
/// on outgoing responses (never for [`Kind::Shared`], always for
/// [`Kind::Unique`] once a second announcement has gone out), and which
/// checkpoint table the Lifetime Manager uses to schedule requeries/expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  /// Multiple records with this exact RRset may validly exist (e.g. PTR).
  Shared,
  /// This record's owner name must be unique on the network (e.g. SRV, A,
  /// AAAA, TXT of a registered service). Subject to probing before it is
  /// first announced.
  Unique,
}

/// A case-insensitive DNS name, compared and hashed per RFC 1035 §3.1 even
/// though it is stored byte-for-byte as received.
#[derive(Debug, Clone)]
pub struct Name(SmolStr);

impl Name {
  /// Builds a name from an already-owned string.
  #[inline]
  pub fn new(s: impl Into<SmolStr>) -> Self {
    Self(s.into())
  }

  /// Builds an owned [`Name`] out of a borrowed wire [`Label`].
  #[inline]
  pub fn from_label(label: Label<'_>) -> Self {
    Self(SmolStr::new(label.to_string()))
  }

  /// The name as written (original casing preserved).
  #[inline]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl PartialEq for Name {
  fn eq(&self, other: &Self) -> bool {
    self.0.eq_ignore_ascii_case(&other.0)
  }
}

impl Eq for Name {}

impl Hash for Name {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for b in self.0.as_bytes() {
      b.to_ascii_lowercase().hash(state);
    }
  }
}

impl From<&str> for Name {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}

/// A single resource record this responder either learned about (remote
/// cache, `rrc`) or is itself publishing (local zone, `rrl`).
///
/// `ttl`/`created` drive the Lifetime Manager's requery and expiry
/// schedule; they are not part of the record's identity. Two records with
/// the same `if_index`, `name`, type and rdata but different ages are
/// duplicates and must be merged, never stored twice — see
/// [`RecordStore::add`](crate::store::RecordStore::add).
#[derive(Debug, Clone)]
pub struct Record {
  /// `0` means "all interfaces", `-1` means "loopback-only", any other
  /// value is a concrete OS interface index, matching the convention
  /// used for external-interface records throughout this crate.
  pub if_index: i32,
  /// The record's owner name.
  pub name: Name,
  /// Always the base class with both the cache-flush and unicast bits
  /// masked off; those bits are wire-framing concerns handled at the
  /// [`crate::message`] layer, not part of a record's identity.
  pub class: u16,
  /// Shared vs. unique, governing probing and the cache-flush bit.
  pub kind: Kind,
  /// The record's owned, type-dispatched rdata.
  pub data: Rdata,
  /// TTL in seconds, as published (for `rrl`) or as received (for `rrc`).
  pub ttl: u32,
  /// When this record entered the store, or was last refreshed by a
  /// matching response (`rrc`) or a successful re-announce (`rrl`).
  pub created: Instant,
  /// The last time a requery was sent for this record's upkeep, if any.
  pub last_query_at: Option<Instant>,
  /// How many consecutive maintenance requeries have gone unanswered.
  /// Reset to `0` whenever the record is refreshed.
  pub requery_count: u8,
  /// For records this responder publishes (`rrl`), the caller-held scope
  /// whose cancellation should trigger a goodbye packet and removal. `None`
  /// for everything learned from the network (`rrc`).
  pub owner: Option<crate::scope::Scope>,
}

impl Record {
  /// Creates a new record, stamping it as created now.
  pub fn new(if_index: i32, name: Name, kind: Kind, data: Rdata, ttl: u32) -> Self {
    Self {
      if_index,
      name,
      class: CLASS_IN,
      kind,
      data,
      ttl: jittered_ttl(ttl),
      created: Instant::now(),
      last_query_at: None,
      requery_count: 0,
      owner: None,
    }
  }

  /// Attaches a publishing scope to this record, turning it into an `rrl`
  /// entry whose lifetime is tied to the scope's cancellation.
  #[inline]
  pub fn with_owner(mut self, owner: crate::scope::Scope) -> Self {
    self.owner = Some(owner);
    self
  }

  /// Builds an owned [`Record`] from a freshly-parsed wire [`ResourceRecord`].
  pub fn from_wire(
    if_index: i32,
    rr: &ResourceRecord<'_>,
    cache_flushed: bool,
  ) -> Result<Self, crate::rdata::RdataError> {
    let data = Rdata::from_wire(rr.ty(), rr.data())?;
    Ok(Self {
      if_index,
      name: Name::from_label(rr.name()),
      class: rr.class() & !CACHE_FLUSH_BIT,
      // Records we *receive* are never ones we probe for; kind only matters
      // for records this responder itself publishes, but PTR-shaped data
      // is still tagged Shared for consistency with the rest of the store.
      kind: if cache_flushed {
        Kind::Unique
      } else {
        Kind::Shared
      },
      data,
      ttl: jittered_ttl(rr.ttl()),
      created: Instant::now(),
      last_query_at: None,
      requery_count: 0,
      owner: None,
    })
  }

  /// The DNS type of this record's data.
  #[inline]
  pub fn ty(&self) -> ResourceType {
    self.data.ty()
  }

  /// How long this record has been in the store.
  #[inline]
  pub fn age(&self) -> Duration {
    self.created.elapsed()
  }

  /// The fraction of the record's TTL window that has elapsed, in `[0, 1]`
  /// (saturating at `1.0` once the record is stale).
  pub fn ttl_elapsed_fraction(&self) -> f64 {
    if self.ttl == 0 {
      return 1.0;
    }
    (self.age().as_secs_f64() / self.ttl as f64).min(1.0)
  }

  /// `true` once the record's TTL has fully elapsed.
  #[inline]
  pub fn is_expired(&self) -> bool {
    self.ttl_elapsed_fraction() >= 1.0
  }

  /// Whether `question` should be answered by this record: same type (or
  /// the question is a wildcard query), same case-insensitive owner name.
  /// Matches §3's Data Model matching rule and `question.go`'s `match`.
  pub fn matches_question(&self, question: &Question<'_>) -> bool {
    let ty_matches = question.ty() == self.ty() || question.ty() == ResourceType::Wildcard;
    ty_matches && Name::from_label(question.name()) == self.name
  }

  /// Two records are the same *identity* when this returns `true`: same
  /// interface, name, type, class and rdata. Used by [`RecordStore::add`]
  /// to dedup and refresh rather than duplicate.
  ///
  /// [`RecordStore::add`]: crate::store::RecordStore::add
  pub fn same_identity(&self, other: &Self) -> bool {
    self.if_index == other.if_index
      && self.name == other.name
      && self.class == other.class
      && self.data == other.data
  }
}
