//! Outgoing message assembly: question/answer coalescing and known-answer
//! suppression.
//!
//! The core loop accumulates everything it wants to ask or answer over a
//! coalescing window (see the send-timer constants in [`crate::engine`])
//! into one of these before handing the result off to the transport for
//! framing and send. Keeping this separate from the event loop itself
//! mirrors `dnssd.go`'s `sendPending`, which likewise batches every
//! pending question/answer into as few outgoing packets as messages allow
//! rather than sending one packet per event.
//!
//! Entries are held in their owned form ([`crate::record::Name`] /
//! [`crate::record::Record`]) rather than as borrowed `mdns_proto` wire
//! types: a builder's contents must survive across core-loop ticks until
//! the send timer fires, and a wire [`Question`]/[`ResourceRecord`]
//! borrows from the name it was built with. [`MessageBuilder::build`]
//! is the one place those borrowed types get constructed, and they never
//! outlive that call.
use mdns_proto::{Question, ResourceRecord, ResourceType, Serialize};

use crate::{
  error::{Error, Result},
  record::{Name, Record},
};

/// A pending question, identified the same way [`crate::question::Question`]
/// is, but without the `if_index` filter that only matters for inbound
/// matching.
#[derive(Debug, Clone)]
struct PendingQuestion {
  name: Name,
  ty: ResourceType,
  class: u16,
}

/// Accumulates the questions and answers destined for a single outgoing
/// packet, deduplicating as entries are added and suppressing answers the
/// querier has already demonstrated it knows about.
#[derive(Debug, Default)]
pub struct MessageBuilder {
  questions: Vec<PendingQuestion>,
  answers: Vec<Record>,
}

impl MessageBuilder {
  /// An empty builder.
  pub fn new() -> Self {
    Self::default()
  }

  /// `true` if nothing has been queued yet.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.questions.is_empty() && self.answers.is_empty()
  }

  /// `true` if an answer matching `record`'s identity is still queued.
  /// Used to tell whether a candidate survived known-answer suppression.
  pub fn contains_identity(&self, record: &Record) -> bool {
    self.answers.iter().any(|r| r.same_identity(record))
  }

  /// Queues a question for `(name, ty)`, unless an identical one is
  /// already pending.
  pub fn ask(&mut self, name: Name, ty: ResourceType) -> &mut Self {
    let dup = self
      .questions
      .iter()
      .any(|q| q.ty == ty && q.name == name);
    if !dup {
      self.questions.push(PendingQuestion {
        name,
        ty,
        class: crate::record::CLASS_IN,
      });
    }
    self
  }

  /// Queues `record` as an answer, unless an identical record (same
  /// identity, see [`Record::same_identity`]) is already pending.
  pub fn answer(&mut self, record: Record) -> &mut Self {
    let dup = self.answers.iter().any(|r| r.same_identity(&record));
    if !dup {
      self.answers.push(record);
    }
    self
  }

  /// Drops any already-queued answer whose stringification equals a
  /// record already present in a peer's Known-Answer list.
  pub fn suppress_known(&mut self, known_answers: &[ResourceRecord<'_>]) {
    self.answers.retain(|candidate| {
      !known_answers.iter().any(|known| {
        known.ty() == candidate.ty()
          && known.class() == candidate.class
          && known.data() == candidate.data.wire().as_ref()
          && known.name().to_string().eq_ignore_ascii_case(candidate.name.as_str())
      })
    });
  }

  /// Consumes the builder, serializing every pending question/answer
  /// into a single wire packet. `is_response` selects the QR flag bit.
  pub fn build(self, is_response: bool) -> Result<Vec<u8>> {
    let questions: Vec<Question<'_>> = self
      .questions
      .iter()
      .map(|q| Question::new(mdns_proto::Label::from(q.name.as_str()), q.ty, q.class))
      .collect();
    let wire_data: Vec<std::borrow::Cow<'_, [u8]>> = self.answers.iter().map(|r| r.data.wire()).collect();
    let answers: Vec<ResourceRecord<'_>> = self
      .answers
      .iter()
      .zip(wire_data.iter())
      .map(|(r, data)| ResourceRecord::new(mdns_proto::Label::from(r.name.as_str()), r.ty(), r.class, r.ttl, data))
      .collect();

    frame(is_response, &questions, &answers)
  }
}

/// Serializes a DNS message's wire header (RFC 1035 §4.1.1) plus
/// `questions` and `answers` into one packet.
///
/// This writes the 12-byte header by hand rather than going through
/// `mdns_proto`'s `Message`/`Header` types: per RFC 6762 §18.1 a
/// multicast message's ID is always zero, and the only flag bits this
/// responder ever needs are QR (query vs. response) and AA (always set on
/// responses, since every answer this responder gives is authoritative
/// for names it publishes) — cheap enough to set directly rather than
/// build out a full flags value the rest of this crate never reads back.
pub fn frame(is_response: bool, questions: &[Question<'_>], answers: &[ResourceRecord<'_>]) -> Result<Vec<u8>> {
  let mut buf = vec![0u8; crate::MAX_PAYLOAD_SIZE];

  buf[2] = if is_response { 0x84 } else { 0x00 };
  buf[4..6].copy_from_slice(&(questions.len() as u16).to_be_bytes());
  buf[6..8].copy_from_slice(&(answers.len() as u16).to_be_bytes());
  let mut offset = 12;

  for q in questions {
    offset += q.serialize(&mut buf[offset..]).map_err(Error::Codec)?;
  }
  for rr in answers {
    offset += rr.serialize(&mut buf[offset..]).map_err(Error::Codec)?;
  }

  buf.truncate(offset);
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::Kind;
  use std::net::Ipv4Addr;

  fn a_record(name: &str, ttl: u32) -> Record {
    Record::new(0, Name::new(name), Kind::Unique, crate::rdata::Rdata::A(Ipv4Addr::new(127, 0, 0, 1)), ttl)
  }

  fn rr<'a>(name: mdns_proto::Label<'a>, ttl: u32, data: &'a [u8]) -> ResourceRecord<'a> {
    ResourceRecord::new(name, ResourceType::A, 1, ttl, data)
  }

  #[test]
  fn ask_dedups_identical_questions() {
    let mut b = MessageBuilder::new();
    b.ask(Name::new("foo.local."), ResourceType::A);
    b.ask(Name::new("foo.local."), ResourceType::A);
    assert_eq!(b.questions.len(), 1);
  }

  #[test]
  fn answer_dedups_identical_records() {
    let mut b = MessageBuilder::new();
    b.answer(a_record("host.local.", 120));
    b.answer(a_record("host.local.", 120));
    assert_eq!(b.answers.len(), 1);
  }

  #[test]
  fn suppress_known_drops_fresh_enough_duplicates() {
    let data = [127, 0, 0, 1];
    let mut b = MessageBuilder::new();
    b.answer(a_record("host.local.", 120));
    let known = [rr(mdns_proto::Label::from("host.local."), 100, &data)];
    b.suppress_known(&known);
    assert!(b.answers.is_empty());
  }

  #[test]
  fn suppress_known_ignores_ttl_and_suppresses_on_identity_alone() {
    let data = [127, 0, 0, 1];
    let mut b = MessageBuilder::new();
    b.answer(a_record("host.local.", 120));
    let known = [rr(mdns_proto::Label::from("host.local."), 10, &data)];
    b.suppress_known(&known);
    assert!(b.answers.is_empty());
  }

  #[test]
  fn suppress_known_keeps_answers_with_no_matching_identity() {
    let other_data = [10, 0, 0, 1];
    let mut b = MessageBuilder::new();
    b.answer(a_record("host.local.", 120));
    let known = [rr(mdns_proto::Label::from("host.local."), 120, &other_data)];
    b.suppress_known(&known);
    assert_eq!(b.answers.len(), 1);
  }

  #[test]
  fn frame_writes_a_well_formed_header() {
    let data = [127, 0, 0, 1];
    let questions = [Question::new(mdns_proto::Label::from("foo.local."), ResourceType::A, 1)];
    let answers = [rr(mdns_proto::Label::from("foo.local."), 120, &data)];
    let bytes = frame(true, &questions, &answers).unwrap();

    assert!(bytes.len() > 12);
    assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), 0, "mDNS id is always zero");
    assert_eq!(bytes[2] & 0x80, 0x80, "QR bit set for a response");
    assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 1);
    assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 1);
  }

  #[test]
  fn build_produces_the_same_counts_as_frame() {
    let mut b = MessageBuilder::new();
    b.ask(Name::new("foo.local."), ResourceType::Ptr);
    b.answer(a_record("bar.local.", 120));
    let bytes = b.build(false).unwrap();
    assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 1);
    assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 1);
  }
}
