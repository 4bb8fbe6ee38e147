//! The Core Event Loop: the single task that owns every mutable piece of
//! this responder's state and is the only site of mutation.
//!
//! Grounded in `dnssd.go`'s `processing()` (the main select loop),
//! `handleIncomingMessage()`/`handleResponseRecords()` (§4.7's dispatch
//! rules) and `runQuery()`/`runProbe()` (how a command turns into an
//! outbound question), generalized behind the [`Command`] channel so the
//! [`crate::registrar::Registrar`] and the public API ([`crate::api`])
//! share one entry point into the loop rather than each poking at the
//! stores directly. Matched records are never handed to a listener here:
//! the core only resolves *which* listeners matched and hands each one
//! to [`crate::dispatch::Dispatcher`], which is the only thing allowed to
//! actually invoke a callback.
use core::time::Duration;
use std::time::Instant;

use agnostic_net::runtime::RuntimeLite;
use async_channel::Receiver;
use futures::FutureExt;
use mdns_proto::{Cursor, Deserialize, Question as WireQuestion, ResourceRecord, ResourceType};
use rand::Rng;

use crate::{
  dispatch::Dispatcher,
  error::{Error, Result},
  lifetime::{self, Due},
  message::MessageBuilder,
  question::{Listener, Question, QuestionRegistry},
  record::{Kind, Name, Record},
  scope::Scope,
  store::RecordStore,
  transport::Transport,
};

/// How long the housekeeping tick waits between sweeps of cancelled
/// scopes. A Context Notifier design would wake the core the instant any
/// registered scope completes; reaching every scope's cancellation
/// channel in one `select!` would mean threading a growing, dynamic set
/// of futures through the loop. This fixed interval is a documented
/// stand-in: cancellation is still observed and acted on (goodbye
/// packets sent, listeners pruned), just within this bound rather than
/// instantly.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(250);

/// A unit of work submitted to the core loop from outside it. This is
/// the only way external code (the public API, the Registrar) touches
/// the stores/registry/builders — see §5's "external code never touches
/// them except via commands."
pub enum Command {
  /// Ask `question`: attach `listener`, replaying already-known matching
  /// records immediately, then issue a network query if this is a new
  /// question no one else is already asking.
  Ask {
    question: Question,
    scope: Option<Scope>,
    listener: Listener,
  },
  /// Forces a fresh network query for `question`, without touching its
  /// registry entry or listeners. Used for the Registrar's repeated probe
  /// retransmissions (§4.4: each of the three probe windows sends its own
  /// question, not just the first) — unlike [`Command::Ask`], this always
  /// hits the wire, whether or not the question is already outstanding.
  Requery { question: Question },
  /// Publish (insert/refresh in *rrl* and announce) `record`. Used both
  /// for the Registrar's 8-step backoff announce and for a Unique
  /// record's immediate conflict-defense re-announcement.
  Publish { record: Record },
  /// Withdraw every *rrl* record matching `(if_index, name, ty)`: send a
  /// TTL=0 goodbye and drop it.
  Withdraw {
    if_index: i32,
    name: Name,
    ty: ResourceType,
  },
}

/// Owns every mutable structure this responder has and runs the single
/// cooperative loop described in §4.6/§5.
pub struct Core<R: RuntimeLite> {
  transport: Transport<R>,
  rrc: RecordStore,
  rrl: RecordStore,
  registry: QuestionRegistry,
  dispatcher: Dispatcher<R>,
  query_builder: MessageBuilder,
  response_builder: MessageBuilder,
  earliest_send_at: Option<Instant>,
  cmd_rx: Receiver<Command>,
  log_empty_responses: bool,
}

impl<R: RuntimeLite> Core<R> {
  /// Builds a core bound to `transport`, consuming commands from `cmd_rx`.
  pub fn new(transport: Transport<R>, cmd_rx: Receiver<Command>) -> Self {
    Self::with_options(transport, cmd_rx, &crate::ServerOptions::default())
  }

  /// Like [`new`](Self::new), honoring `opts.log_empty_responses()`.
  pub fn with_options(transport: Transport<R>, cmd_rx: Receiver<Command>, opts: &crate::ServerOptions) -> Self {
    Self {
      transport,
      rrc: RecordStore::new(),
      rrl: RecordStore::new(),
      registry: QuestionRegistry::new(),
      dispatcher: Dispatcher::new(),
      query_builder: MessageBuilder::new(),
      response_builder: MessageBuilder::new(),
      earliest_send_at: None,
      cmd_rx,
      log_empty_responses: opts.log_empty_responses(),
    }
  }

  /// Runs the loop until `cmd_rx` is closed (every [`crate::api::Handle`]
  /// dropped). Never returns `Err` under normal operation; transport
  /// failures are logged and treated as a retryable tick per §4.1.
  pub async fn run(mut self) {
    loop {
      let refresh_at = self.next_refresh_time();
      let send_at = self.earliest_send_at;
      let housekeeping_at = Instant::now() + HOUSEKEEPING_INTERVAL;

      let refresh_sleep = sleep_until::<R>(refresh_at);
      let send_sleep = sleep_until::<R>(send_at);
      let housekeeping_sleep = R::sleep(housekeeping_at.saturating_duration_since(Instant::now()));

      futures::select! {
        cmd = self.cmd_rx.recv().fuse() => {
          match cmd {
            Ok(cmd) => self.handle_command(cmd),
            Err(_) => return, // every Handle dropped: shut down.
          }
        }
        incoming = self.transport.recv().fuse() => {
          match incoming {
            Ok(incoming) => self.handle_incoming(&incoming.bytes, incoming.if_index),
            Err(err) => tracing::warn!(error = %err, "mDNS transport read failed"),
          }
        }
        _ = refresh_sleep.fuse() => {
          self.run_lifetime_scans();
        }
        _ = send_sleep.fuse() => {
          self.flush().await;
        }
        _ = housekeeping_sleep.fuse() => {
          self.registry.prune();
        }
      }
    }
  }

  fn handle_command(&mut self, cmd: Command) {
    match cmd {
      Command::Ask {
        question,
        scope,
        listener,
      } => self.handle_ask(question, scope, listener),
      Command::Requery { question } => self.handle_requery(question),
      Command::Publish { record } => self.handle_publish(record),
      Command::Withdraw { if_index, name, ty } => self.handle_withdraw(if_index, name, ty),
    }
  }

  fn handle_requery(&mut self, question: Question) {
    self.query_builder.ask(question.name, question.ty);
    self.schedule_send(Duration::from_millis(10));
  }

  fn handle_ask(&mut self, question: Question, scope: Option<Scope>, listener: Listener) {
    for existing in self.rrc.by_name_and_type(&question.name, question.ty) {
      self.dispatcher.dispatch(listener.clone(), existing.clone());
    }
    for existing in self.rrl.by_name_and_type(&question.name, question.ty) {
      self.dispatcher.dispatch(listener.clone(), existing.clone());
    }

    let (idx, created) = self.registry.find_or_create(question.clone(), scope);
    self.registry.attach(idx, listener);

    if created {
      self.query_builder.ask(question.name, question.ty);
      self.schedule_send(Duration::from_millis(10));
    }
  }

  fn handle_publish(&mut self, record: Record) {
    self.rrl.add(record.clone());
    self.response_builder.answer(record);
    self.schedule_send(Duration::ZERO);
  }

  fn handle_withdraw(&mut self, if_index: i32, name: Name, ty: ResourceType) {
    let removed = self.rrl.remove_where(|r| {
      (if_index == 0 || r.if_index == if_index) && r.name == name && r.ty() == ty
    });
    for mut record in removed {
      record.ttl = 0;
      self.response_builder.answer(record);
    }
    if !self.response_builder.is_empty() {
      self.schedule_send(Duration::ZERO);
    }
  }

  fn handle_incoming(&mut self, bytes: &[u8], if_index: i32) {
    let (is_response, questions, answers) = match parse(bytes) {
      Ok(parsed) => parsed,
      Err(err) => {
        tracing::debug!(error = %err, "dropping unparseable mDNS datagram");
        return;
      }
    };

    if is_response {
      self.handle_response(if_index, &answers);
    } else {
      self.handle_query(if_index, &questions, &answers);
    }
  }

  fn handle_response(&mut self, if_index: i32, answers: &[ResourceRecord<'_>]) {
    for rr in answers {
      let cache_flushed = rr.class() & crate::record::CACHE_FLUSH_BIT != 0;
      let record = match Record::from_wire(if_index, rr, cache_flushed) {
        Ok(record) => record,
        Err(err) => {
          tracing::debug!(error = %err, "dropping unparseable resource record");
          continue;
        }
      };

      self.rrc.add(record.clone());
      for listener in self.registry.matching_listeners(&record) {
        self.dispatcher.dispatch(listener, record.clone());
      }

      let challenged = self
        .rrl
        .iter()
        .any(|local| local.kind == Kind::Unique && local.same_identity(&record));
      if challenged {
        if let Some(local) = self.rrl.iter().find(|l| l.same_identity(&record)).cloned() {
          self.response_builder.answer(local);
          self.schedule_send(Duration::ZERO);
        }
      }
    }
  }

  fn handle_query(&mut self, if_index: i32, questions: &[WireQuestion<'_>], known_answers: &[ResourceRecord<'_>]) {
    let mut queued = Vec::new();

    for q in questions {
      let name = Name::from_label(q.name());
      let wire_q = Question::new(if_index, name.clone(), q.ty());

      let candidates: Vec<Record> = self
        .rrl
        .iter()
        .filter(|r| wire_q.matches(r))
        .cloned()
        .collect();

      for candidate in candidates {
        let is_unique = candidate.kind == Kind::Unique;
        self.response_builder.answer(candidate.clone());
        queued.push(candidate);
        if is_unique {
          self.schedule_send(Duration::ZERO);
        } else {
          self.schedule_send(jittered(Duration::from_millis(500), 100));
        }
      }
    }

    self.response_builder.suppress_known(known_answers);
    let any_emitted = queued.iter().any(|r| self.response_builder.contains_identity(r));

    if any_emitted {
      for q in questions {
        self
          .response_builder
          .ask(Name::from_label(q.name()), q.ty());
      }
      self.schedule_send(jittered(Duration::from_millis(500), 100));
    } else if self.log_empty_responses {
      for q in questions {
        tracing::info!(if_index, name = %q.name(), ty = ?q.ty(), "no answer for mDNS query");
      }
    }
  }

  fn schedule_send(&mut self, after: Duration) {
    let at = Instant::now() + after;
    self.earliest_send_at = Some(match self.earliest_send_at {
      Some(existing) if existing <= at => existing,
      _ => at,
    });
  }

  async fn flush(&mut self) {
    let query_builder = core::mem::take(&mut self.query_builder);
    if !query_builder.is_empty() {
      match query_builder.build(false) {
        Ok(bytes) => self.send(bytes).await,
        Err(err) => tracing::warn!(error = %err, "failed to encode outgoing query"),
      }
    }

    let response_builder = core::mem::take(&mut self.response_builder);
    if !response_builder.is_empty() {
      match response_builder.build(true) {
        Ok(bytes) => self.send(bytes).await,
        Err(err) => tracing::warn!(error = %err, "failed to encode outgoing response"),
      }
    }

    self.earliest_send_at = None;
  }

  async fn send(&self, bytes: Vec<u8>) {
    if let Err(err) = self.transport.send(&bytes).await {
      tracing::warn!(error = %err, "mDNS send failed on every bound family");
    }
  }

  fn run_lifetime_scans(&mut self) {
    let now = Instant::now();
    let query_builder = &mut self.query_builder;
    let registry = &self.registry;
    lifetime::scan(&mut self.rrc, now, |due| match due {
      Due::RequeryOrRefresh(record) => {
        if registry.is_active(record.if_index, record.ty(), &record.name) {
          query_builder.ask(record.name.clone(), record.ty());
        }
      }
      Due::Remove(_) => {}
    });

    let response_builder = &mut self.response_builder;
    lifetime::scan(&mut self.rrl, now, |due| match due {
      Due::RequeryOrRefresh(record) => {
        response_builder.answer(record.clone());
      }
      Due::Remove(mut record) => {
        record.ttl = 0;
        response_builder.answer(record);
      }
    });

    if !self.query_builder.is_empty() || !self.response_builder.is_empty() {
      self.schedule_send(Duration::from_millis(100));
    }
  }

  fn next_refresh_time(&self) -> Option<Instant> {
    // Recomputed fresh each tick by peeking every record's next checkpoint
    // directly (no mutation, no speculative scan); cheap enough at this
    // responder's expected record counts.
    self
      .rrc
      .iter()
      .chain(self.rrl.iter())
      .map(lifetime::next_due_at)
      .min()
  }
}

fn jittered(base: Duration, jitter_ms: u64) -> Duration {
  let offset = rand::thread_rng().gen_range(0..jitter_ms.max(1));
  base + Duration::from_millis(offset)
}

async fn sleep_until<R: RuntimeLite>(at: Option<Instant>) {
  match at {
    Some(at) => R::sleep(at.saturating_duration_since(Instant::now())).await,
    None => core::future::pending().await,
  }
}

/// Parses a raw mDNS datagram's header, question section and answer
/// section. Authority/additional records are not decoded: nothing in
/// this responder currently reads them.
fn parse(buf: &[u8]) -> Result<(bool, Vec<WireQuestion<'_>>, Vec<ResourceRecord<'_>>)> {
  if buf.len() < 12 {
    return Err(Error::Io(std::io::Error::new(
      std::io::ErrorKind::InvalidData,
      "mDNS datagram shorter than a DNS header",
    )));
  }

  let is_response = buf[2] & 0x80 != 0;
  let qdcount = u16::from_be_bytes([buf[4], buf[5]]);
  let ancount = u16::from_be_bytes([buf[6], buf[7]]);

  // `Question`/`ResourceRecord` are built from a throwaway placeholder
  // (mirroring the `Label::default()` idiom `crate::rdata::Rdata::from_wire`
  // uses for in-place label decoding) and then overwritten in full by
  // `deserialize`; the placeholder's own field values never escape.
  let mut cursor = Cursor::new(&buf[12..]);
  let mut questions = Vec::with_capacity(qdcount as usize);
  for _ in 0..qdcount {
    let mut q = WireQuestion::new(mdns_proto::Label::default(), ResourceType::A, 0);
    cursor = q.deserialize(cursor).map_err(Error::Codec)?;
    questions.push(q);
  }

  let mut answers = Vec::with_capacity(ancount as usize);
  for _ in 0..ancount {
    let mut rr = ResourceRecord::new(mdns_proto::Label::default(), ResourceType::A, 0, 0, &[]);
    cursor = rr.deserialize(cursor).map_err(Error::Codec)?;
    answers.push(rr);
  }

  Ok((is_response, questions, answers))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_rejects_short_datagrams() {
    assert!(parse(&[0u8; 4]).is_err());
  }

  #[test]
  fn parse_reads_header_counts_for_an_empty_message() {
    let mut header = [0u8; 12];
    header[2] = 0x84; // QR bit set
    let (is_response, questions, answers) = parse(&header).unwrap();
    assert!(is_response);
    assert!(questions.is_empty());
    assert!(answers.is_empty());
  }

  #[test]
  fn parse_round_trips_a_framed_query() {
    let mut b = MessageBuilder::new();
    b.ask(Name::new("foo.local."), ResourceType::Ptr);
    let bytes = b.build(false).unwrap();
    let (is_response, questions, _answers) = parse(&bytes).unwrap();
    assert!(!is_response);
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].ty(), ResourceType::Ptr);
  }
}
