//! The UDP transport: multicast send/receive plus the local-loopback
//! self-receipt filter.
//!
//! Grounded in §4.1's Transport contract and in `net.go`'s `netServer`
//! from the system this engine generalizes (bind, join, read-loop,
//! self-filter), adapted to `agnostic-net`'s runtime-agnostic socket type
//! using the same `<N::UdpSocket as TryFrom<_>>::try_from` conversion
//! [`crate::utils`]'s own helpers perform.
//!
//! One simplification from the transport contract above: real per-packet
//! ancillary data (`IP_PKTINFO`/`IPV6_PKTINFO` control messages) that
//! would let each datagram carry the exact interface it arrived on is not
//! implemented — `rustix`'s safe socket surface this crate otherwise
//! builds on does not expose cmsg decoding, and hand-rolling it is out of
//! proportion to what the rest of this responder needs. Every inbound
//! datagram is instead tagged `if_index = 0` ("all interfaces", see
//! [`crate::record::Record::if_index`]), which callers already treat as a
//! wildcard match. The meaningful half of the contract — recognizing and
//! dropping the responder's own transmissions reflected back to it — is
//! still implemented, via [`crate::utils::local_addresses`].
use core::net::SocketAddr;
use std::io;

use agnostic_net::{Net, runtime::RuntimeLite};
use futures::FutureExt;

use crate::{IPV4_MDNS, IPV6_MDNS, MDNS_PORT, ServerOptions, utils};

/// A datagram received off either multicast socket, already past the
/// self-receipt filter.
pub struct Incoming {
  /// Raw wire bytes, as received.
  pub bytes: Vec<u8>,
  /// The interface the datagram is attributed to. Always `0` (see the
  /// module docs above for why this crate does not track the real
  /// per-packet interface).
  pub if_index: i32,
  /// The sender's address.
  pub from: SocketAddr,
}

/// Owns the two multicast sockets (IPv4 and IPv6) backing this
/// responder, plus the set of local addresses used to recognize the
/// responder's own transmissions reflected back to it.
pub struct Transport<R: RuntimeLite> {
  v4: Option<<R::Net as Net>::UdpSocket>,
  v6: Option<<R::Net as Net>::UdpSocket>,
  local_addrs: Vec<core::net::IpAddr>,
}

impl<R: RuntimeLite> Transport<R> {
  /// Binds a wildcard multicast socket per address family and joins the
  /// mDNS group on each. Succeeds as long as at least one family bound;
  /// a family whose bind/join fails is logged and left absent rather
  /// than failing the whole transport, matching §4.1: "Startup requires
  /// successful join on at least one interface/family; otherwise
  /// construction fails."
  pub async fn bind() -> io::Result<Self> {
    Self::bind_with(&ServerOptions::default()).await
  }

  /// Like [`bind`](Self::bind), binding each family's multicast interface
  /// from `opts` rather than the wildcard interface.
  pub async fn bind_with(opts: &ServerOptions) -> io::Result<Self> {
    let v4 = match utils::multicast_udp4_socket::<R::Net>(opts.ipv4_interface, MDNS_PORT) {
      Ok(sock) => Some(sock),
      Err(err) => {
        tracing::warn!(error = %err, "failed to bind IPv4 multicast socket");
        None
      }
    };
    let v6 = match utils::multicast_udp6_socket::<R::Net>(opts.ipv6_interface, MDNS_PORT) {
      Ok(sock) => Some(sock),
      Err(err) => {
        tracing::warn!(error = %err, "failed to bind IPv6 multicast socket");
        None
      }
    };

    if v4.is_none() && v6.is_none() {
      return Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        "failed to join the mDNS multicast group on either address family",
      ));
    }

    let local_addrs = utils::local_addresses().unwrap_or_default();

    Ok(Self {
      v4,
      v6,
      local_addrs,
    })
  }

  /// `true` if at least one family is still bound.
  #[inline]
  pub fn is_alive(&self) -> bool {
    self.v4.is_some() || self.v6.is_some()
  }

  /// Writes `bytes` to both multicast groups. A failure on one family is
  /// logged and does not prevent the other from being tried; only when
  /// every bound family fails is an error returned, matching §4.1:
  /// "Partial-failure per interface is not fatal; if *all* family writes
  /// fail, report a transport-down condition upstream."
  pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
    let mut any_ok = false;
    let mut last_err = None;

    if let Some(v4) = &self.v4 {
      match v4.send_to(bytes, (IPV4_MDNS, MDNS_PORT)).await {
        Ok(_) => any_ok = true,
        Err(err) => {
          tracing::debug!(error = %err, family = "v4", "mDNS send failed");
          last_err = Some(err);
        }
      }
    }

    if let Some(v6) = &self.v6 {
      match v6.send_to(bytes, (IPV6_MDNS, MDNS_PORT)).await {
        Ok(_) => any_ok = true,
        Err(err) => {
          tracing::debug!(error = %err, family = "v6", "mDNS send failed");
          last_err = Some(err);
        }
      }
    }

    if any_ok {
      Ok(())
    } else {
      Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotConnected, "transport has no bound sockets")
      }))
    }
  }

  /// Receives one datagram from whichever family socket is ready first,
  /// dropping and retrying internally on a self-receipt or a read error
  /// (§4.1: "a read error is logged and the read loop continues"). Each
  /// family gets its own scratch buffer since both recv futures are
  /// live (if unpolled) for the duration of the `select!`.
  pub async fn recv(&self) -> io::Result<Incoming> {
    let mut buf4 = vec![0u8; crate::MAX_PAYLOAD_SIZE];
    let mut buf6 = vec![0u8; crate::MAX_PAYLOAD_SIZE];

    loop {
      let (n, from, bytes) = match (&self.v4, &self.v6) {
        (Some(v4), Some(v6)) => {
          futures::select! {
            res = v4.recv_from(&mut buf4).fuse() => {
              let (n, from) = res?;
              (n, from, &buf4)
            }
            res = v6.recv_from(&mut buf6).fuse() => {
              let (n, from) = res?;
              (n, from, &buf6)
            }
          }
        }
        (Some(v4), None) => {
          let (n, from) = v4.recv_from(&mut buf4).await?;
          (n, from, &buf4)
        }
        (None, Some(v6)) => {
          let (n, from) = v6.recv_from(&mut buf6).await?;
          (n, from, &buf6)
        }
        (None, None) => {
          return Err(io::Error::new(io::ErrorKind::NotConnected, "transport has no bound sockets"));
        }
      };

      if self.local_addrs.contains(&from.ip()) {
        continue;
      }

      return Ok(Incoming {
        bytes: bytes[..n].to_vec(),
        if_index: 0,
        from,
      });
    }
  }

  /// Idempotent shutdown: drops both sockets, so any further `send`/`recv`
  /// observes "no bound sockets" rather than a stale handle.
  pub fn shutdown(&mut self) {
    self.v4 = None;
    self.v6 = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

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

  /// Binding with default, wildcard-interface options joins the multicast
  /// group on at least one family and comes up alive.
  async fn bind_succeeds_and_reports_alive<R: RuntimeLite>() {
    let t = Transport::<R>::bind().await.unwrap();
    assert!(t.is_alive());
  }

  /// `shutdown` is idempotent and leaves both `send`/`recv` reporting
  /// "no bound sockets" rather than panicking or hanging.
  async fn shutdown_makes_the_transport_report_dead<R: RuntimeLite>() {
    let mut t = Transport::<R>::bind().await.unwrap();
    t.shutdown();
    assert!(!t.is_alive());
    t.shutdown();
    assert!(!t.is_alive());

    let err = t.send(b"hello").await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotConnected);
  }

  /// `local_addresses()` makes every bound interface on this host count as
  /// "ourselves", so a transport's own transmissions never surface from
  /// `recv()` even when multicast loopback reflects them back to the same
  /// socket: `recv()` should sit idle rather than return the echo.
  async fn self_transmissions_are_filtered_out<R: RuntimeLite>() {
    let t = Transport::<R>::bind().await.unwrap();
    t.send(b"hello mdns").await.unwrap();

    let timed_out = futures::select! {
      res = t.recv().fuse() => {
        panic!("recv() unexpectedly returned a datagram: {:?}", res.map(|i| i.bytes));
      }
      _ = R::sleep(core::time::Duration::from_millis(300)).fuse() => true,
    };
    assert!(timed_out);
  }

  #[cfg(feature = "tokio")]
  test_suites!(tokio, agnostic_net::runtime::tokio::TokioRuntime, {
    bind_succeeds_and_reports_alive,
    shutdown_makes_the_transport_report_dead,
    self_transmissions_are_filtered_out,
  });

  #[cfg(feature = "smol")]
  test_suites!(smol, agnostic_net::runtime::smol::SmolRuntime, {
    bind_succeeds_and_reports_alive,
    shutdown_makes_the_transport_report_dead,
    self_transmissions_are_filtered_out,
  });

  #[cfg(feature = "async-std")]
  test_suites!(async_std, agnostic_net::runtime::async_std::AsyncStdRuntime, {
    bind_succeeds_and_reports_alive,
    shutdown_makes_the_transport_report_dead,
    self_transmissions_are_filtered_out,
  });
}
