//! Per-record TTL-driven scheduling: cached-record requery and
//! published-record refresh-announce.
//!
//! Grounded in `dnssd.go`'s periodic maintenance pass, generalized to the
//! explicit checkpoint tables below. There is no background timer task —
//! [`scan`] is invoked from the core loop whenever the refresh timer it
//! last armed fires, and returns the next time it should be invoked again.
use std::time::{Duration, Instant};

use crate::record::{Kind, Record};
use crate::store::RecordStore;

/// `80%, 85%, 90%, 95%, 100%` of TTL, for [`Kind::Shared`] records: up to
/// four requeries/refreshes before the fifth checkpoint drops the record.
const SHARED_CHECKPOINTS: &[f64] = &[0.80, 0.85, 0.90, 0.95, 1.0];

/// `80%, 100%` of TTL, for [`Kind::Unique`] records: a single
/// requery/refresh before the second checkpoint drops the record.
const UNIQUE_CHECKPOINTS: &[f64] = &[0.80, 1.0];

fn checkpoints(kind: Kind) -> &'static [f64] {
  match kind {
    Kind::Shared => SHARED_CHECKPOINTS,
    Kind::Unique => UNIQUE_CHECKPOINTS,
  }
}

/// What the core loop should do with a record `scan` has decided is due.
pub enum Due<'a> {
  /// The checkpoint below the class maximum was reached: bump
  /// `requery_count` and ask the caller to requery (cached) or
  /// refresh-announce (published) `record`, which remains in the store.
  RequeryOrRefresh(&'a Record),
  /// The final checkpoint was reached (or the record's owning scope was
  /// cancelled): `record` is being removed from the store. For published
  /// records this is the caller's cue to emit a goodbye packet.
  Remove(Record),
}

/// The instant `record`'s next checkpoint falls due, without mutating it
/// or the store it lives in. Used to peek the earliest upcoming checkpoint
/// across both stores when arming the core loop's refresh timer, so that
/// arming the timer never requires running a (mutating) scan speculatively.
pub fn next_due_at(record: &Record) -> Instant {
  let table = checkpoints(record.kind);
  let checkpoint_idx = (record.requery_count as usize).min(table.len() - 1);
  record.created + Duration::from_secs_f64(record.ttl as f64 * table[checkpoint_idx])
}

/// Scans every record in `store`, invoking `on_due` for each one that has
/// reached a checkpoint, and returns the earliest next check time across
/// whatever remains (the core arms its refresh timer from this).
///
/// `on_due` returning `RequeryOrRefresh` leaves the record where it is
/// (the caller is responsible for bumping `last_query_at`/resetting
/// `created` as appropriate for the store in question, see
/// [`Record::with_owner`] for why cached vs. published records differ
/// here); returning after a `Remove` drops the record unconditionally.
pub fn scan(
  store: &mut RecordStore,
  now: Instant,
  mut on_due: impl FnMut(Due<'_>),
) -> Option<Instant> {
  let mut next: Option<Instant> = None;
  let mut bump = |t: Instant| {
    next = Some(match next {
      Some(cur) if cur <= t => cur,
      _ => t,
    });
  };

  let removed = store.remove_where(|record| {
    if let Some(owner) = &record.owner {
      if owner.is_cancelled() {
        return true;
      }
    }

    let table = checkpoints(record.kind);
    let checkpoint_idx = record.requery_count as usize;
    if checkpoint_idx >= table.len() {
      // Defensive: a record should never sit above its class maximum, but
      // treat it as due-for-removal rather than panicking on stale state.
      return true;
    }

    let check_at =
      record.created + Duration::from_secs_f64(record.ttl as f64 * table[checkpoint_idx]);
    if now < check_at {
      bump(check_at);
      return false;
    }

    if checkpoint_idx + 1 >= table.len() {
      true
    } else {
      false
    }
  });

  for mut record in removed {
    let was_cancelled = record.owner.as_ref().is_some_and(|o| o.is_cancelled());
    let table = checkpoints(record.kind);
    let checkpoint_idx = record.requery_count as usize;
    let has_next_checkpoint = !was_cancelled && checkpoint_idx + 1 < table.len();

    if has_next_checkpoint {
      record.requery_count += 1;
      on_due(Due::RequeryOrRefresh(&record));
      let check_at = record.created
        + Duration::from_secs_f64(record.ttl as f64 * table[record.requery_count as usize]);
      bump(check_at);
      store.add(record);
    } else {
      on_due(Due::Remove(record));
    }
  }

  next
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rdata::Rdata;
  use crate::record::Name;
  use std::net::Ipv4Addr;

  fn aged_record(kind: Kind, ttl: u32, age: Duration) -> Record {
    let mut r = Record::new(0, Name::new("x.local."), kind, Rdata::A(Ipv4Addr::LOCALHOST), ttl);
    r.created = Instant::now() - age;
    r
  }

  #[test]
  fn shared_record_below_first_checkpoint_is_left_alone() {
    let mut store = RecordStore::new();
    store.add(aged_record(Kind::Shared, 1000, Duration::from_secs(100)));
    let mut due = Vec::new();
    let next = scan(&mut store, Instant::now(), |d| {
      due.push(matches!(d, Due::RequeryOrRefresh(_)))
    });
    assert!(due.is_empty());
    assert!(next.is_some());
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn shared_record_past_80_percent_requeries_and_survives() {
    let mut store = RecordStore::new();
    store.add(aged_record(Kind::Shared, 1000, Duration::from_secs(850)));
    let mut requeries = 0;
    let mut removes = 0;
    scan(&mut store, Instant::now(), |d| match d {
      Due::RequeryOrRefresh(_) => requeries += 1,
      Due::Remove(_) => removes += 1,
    });
    assert_eq!(requeries, 1);
    assert_eq!(removes, 0);
    assert_eq!(store.len(), 1);
    assert_eq!(store.iter().next().unwrap().requery_count, 1);
  }

  #[test]
  fn unique_record_past_final_checkpoint_is_removed() {
    let mut store = RecordStore::new();
    let mut r = aged_record(Kind::Unique, 100, Duration::from_secs(81));
    r.requery_count = 1;
    store.add(r);
    let mut removes = 0;
    scan(&mut store, Instant::now(), |d| {
      if matches!(d, Due::Remove(_)) {
        removes += 1;
      }
    });
    assert_eq!(removes, 1);
    assert!(store.is_empty());
  }

  #[test]
  fn cancelled_owner_is_removed_regardless_of_ttl_progress() {
    let mut store = RecordStore::new();
    let (canceller, scope) = crate::scope::Canceller::new();
    let r = aged_record(Kind::Unique, 1000, Duration::from_secs(1)).with_owner(scope);
    store.add(r);
    canceller.cancel();

    let mut removes = 0;
    scan(&mut store, Instant::now(), |d| {
      if matches!(d, Due::Remove(_)) {
        removes += 1;
      }
    });
    assert_eq!(removes, 1);
    assert!(store.is_empty());
  }
}
