//! Engine-level scenarios that need a full [`Handle`], as opposed to the
//! `#[cfg(test)]` units colocated with their module. Every test binds with
//! [`ServerOptions::default`], which on a sandboxed CI host with no
//! non-loopback interface still comes up alive (its sockets are bound, just
//! not joined to any multicast group — see `utils::local_ipv4_addrs`). None
//! of the assertions below depend on an actual wire round-trip making it
//! back: a registered record answers a same-process query straight out of
//! *rrl*, so this whole file is loopback-safe by construction, matching
//! `transport.rs`'s own per-runtime test layout.
use core::time::Duration;
use std::net::Ipv4Addr;

use agnostic_net::runtime::RuntimeLite;
use futures::FutureExt;
use mdns_responder::{Error, Flags, Kind, Rdata, ServerOptions, ServiceBuilder, api::Handle};

macro_rules! test_suites {
  ($runtime:ident, $rt:ty, {
    $($name:ident),+$(,)?
  }) => {
    $(
      paste::paste! {
        #[test]
        fn [< $runtime _ $name >]() {
          [< $runtime _run >]($name::<$rt>());
        }
      }
    )*
  }
}

#[cfg(feature = "tokio")]
fn tokio_run<F: core::future::Future<Output = ()>>(f: F) {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap()
    .block_on(f);
}

#[cfg(feature = "smol")]
fn smol_run<F: core::future::Future<Output = ()>>(f: F) {
  smol::block_on(f);
}

#[cfg(feature = "async-std")]
fn async_std_run<F: core::future::Future<Output = ()>>(f: F) {
  async_std::task::block_on(f);
}

fn builder() -> ServiceBuilder<'static> {
  ServiceBuilder::new("myinstance".into(), "_http._tcp".into())
    .with_domain("local".into())
    .with_hostname("myhost".into())
    .with_port(8080)
    .with_ip(Ipv4Addr::new(127, 0, 0, 1).into())
    .with_txt_record("path=/index.html".into())
}

/// Registers a service's whole four-record pattern concurrently (the
/// `Kind::Unique` records each run their own probe window in parallel,
/// since they are distinct names/types) and makes sure a Browse on the
/// same handle sees the service PTR already decomposed into
/// `(serviceName, regType, domain)`.
async fn browse_decomposes_a_freshly_registered_service<R: RuntimeLite>() {
  let handle = Handle::<R>::new().await.unwrap();
  let svc = builder().finalize().unwrap();

  let registrations = svc
    .records(0)
    .into_iter()
    .map(|record| handle.register(record.if_index, record.name, record.kind, record.data, record.ttl));
  let _cancellers: Vec<_> = futures::future::join_all(registrations)
    .await
    .into_iter()
    .collect::<Result<Vec<_>, Error>>()
    .unwrap();

  let browsing = handle.browse(0, "_http._tcp.local.").await;
  let event = futures::select! {
    event = browsing.recv().fuse() => event,
    _ = R::sleep(Duration::from_secs(2)).fuse() => None,
  };
  let event = event.expect("browse should have decomposed the registered PTR within 2s");
  assert_eq!(event.service_name.as_str(), "myinstance");
  assert_eq!(event.reg_type.as_str(), "_http._tcp");
  assert_eq!(event.domain.as_str(), "local.");
}

/// Resolve queries `SRV` and `TXT` independently and only yields a pair
/// once both halves of the same instance have been seen, covering the
/// registered instance's records from one `register` pass.
async fn resolve_pairs_srv_and_txt_for_the_same_instance<R: RuntimeLite>() {
  let handle = Handle::<R>::new().await.unwrap();
  let svc = builder().finalize().unwrap();

  let registrations = svc
    .records(0)
    .into_iter()
    .map(|record| handle.register(record.if_index, record.name, record.kind, record.data, record.ttl));
  let _cancellers: Vec<_> = futures::future::join_all(registrations)
    .await
    .into_iter()
    .collect::<Result<Vec<_>, Error>>()
    .unwrap();

  let mut resolving = handle.resolve(0, "myinstance._http._tcp.local.").await;
  let event = futures::select! {
    event = resolving.recv().fuse() => event,
    _ = R::sleep(Duration::from_secs(2)).fuse() => None,
  };
  let event = event.expect("resolve should pair SRV and TXT for the registered instance within 2s");
  assert_eq!(event.srv.name.as_str(), "myinstance._http._tcp.local.");
  assert_eq!(event.txt.name.as_str(), "myinstance._http._tcp.local.");
}

/// A `Kind::Unique` registration with no conflicting peer on the network
/// still spans the full three-round probe window (three 250ms timeouts)
/// before `register` resolves, rather than short-circuiting after the
/// first probe.
async fn probing_with_no_conflict_spans_multiple_probe_rounds<R: RuntimeLite>() {
  let handle = Handle::<R>::new().await.unwrap();
  let started = std::time::Instant::now();
  let canceller = handle
    .register(
      0,
      "probe-timing-host.local.",
      Kind::Unique,
      Rdata::A(Ipv4Addr::new(127, 0, 0, 1)),
      120,
    )
    .await
    .unwrap();
  let elapsed = started.elapsed();
  assert!(
    elapsed >= Duration::from_millis(500),
    "register() returned after {elapsed:?}, expected at least two full probe rounds"
  );
  drop(canceller);
}

/// `enumerate_domains` never issues a network query: it answers
/// synchronously with the one domain this responder ever knows about, well
/// under the time a real round trip would take.
async fn enumerate_domains_answers_synchronously_with_local<R: RuntimeLite>() {
  let handle = Handle::<R>::with_options(&ServerOptions::default()).await.unwrap();
  let domains = handle.enumerate_domains(0, "", Flags::BROWSE_DOMAINS).await;

  let event = futures::select! {
    event = domains.recv().fuse() => event,
    _ = R::sleep(Duration::from_millis(50)).fuse() => None,
  };
  let event = event.expect("enumerate_domains should answer within 50ms, with no network round-trip");
  assert!(event.flags.contains(Flags::ADD));
  assert!(event.flags.contains(Flags::DEFAULT));
  assert_eq!(event.record.name.as_str(), "local.");
}

#[cfg(feature = "tokio")]
test_suites!(tokio, agnostic_net::runtime::tokio::TokioRuntime, {
  browse_decomposes_a_freshly_registered_service,
  resolve_pairs_srv_and_txt_for_the_same_instance,
  probing_with_no_conflict_spans_multiple_probe_rounds,
  enumerate_domains_answers_synchronously_with_local,
});

#[cfg(feature = "smol")]
test_suites!(smol, agnostic_net::runtime::smol::SmolRuntime, {
  browse_decomposes_a_freshly_registered_service,
  resolve_pairs_srv_and_txt_for_the_same_instance,
  probing_with_no_conflict_spans_multiple_probe_rounds,
  enumerate_domains_answers_synchronously_with_local,
});

#[cfg(feature = "async-std")]
test_suites!(async_std, agnostic_net::runtime::async_std::AsyncStdRuntime, {
  browse_decomposes_a_freshly_registered_service,
  resolve_pairs_srv_and_txt_for_the_same_instance,
  probing_with_no_conflict_spans_multiple_probe_rounds,
  enumerate_domains_answers_synchronously_with_local,
});
