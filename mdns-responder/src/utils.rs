use std::{
  io,
  net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket as StdUdpSocket},
};

use agnostic_net::Net;

use crate::{IPV4_MDNS, IPV6_MDNS};

/// Every IPv4 address on a local, non-loopback interface, the candidate
/// set `multicast_udp4_socket` joins the mDNS group on when no specific
/// interface was requested (RFC 6762 §4: a responder joins on every
/// eligible interface, not just one).
fn local_ipv4_addrs() -> io::Result<Vec<Ipv4Addr>> {
  Ok(
    if_addrs::get_if_addrs()?
      .into_iter()
      .filter_map(|iface| match iface.ip() {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
      })
      .collect(),
  )
}

/// Every IPv6 address on a local, non-loopback interface, paired with the
/// interface's scope id, the candidate set `multicast_udp6_socket` joins
/// the mDNS group on when no specific interface was requested.
fn local_ipv6_scopes() -> io::Result<Vec<u32>> {
  Ok(
    if_addrs::get_if_addrs()?
      .into_iter()
      .filter(|iface| matches!(iface.ip(), IpAddr::V6(v6) if !v6.is_loopback()))
      .filter_map(|iface| iface.index)
      .collect(),
  )
}

#[cfg(unix)]
pub(crate) use unix_impl::*;

#[cfg(unix)]
mod unix_impl {
  use super::*;
  use rustix::net::{AddressFamily, SocketType, bind, ipproto, socket, sockopt};

  pub(crate) fn unicast_udp4_socket<N: Net>(ifi: Option<Ipv4Addr>) -> io::Result<N::UdpSocket> {
    let sock = socket(AddressFamily::INET, SocketType::DGRAM, Some(ipproto::UDP))?;
    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, 0).into();
    bind(&sock, &addr)?;

    if let Some(ifi) = ifi {
      if !ifi.is_unspecified() {
        sockopt::set_ip_multicast_if(&sock, &ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn unicast_udp6_socket<N: Net>(ifi: Option<u32>) -> io::Result<N::UdpSocket> {
    let sock = socket(AddressFamily::INET6, SocketType::DGRAM, Some(ipproto::UDP))?;
    sockopt::set_ipv6_v6only(&sock, true)?;

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, 0).into();
    bind(&sock, &addr)?;

    if let Some(ifi) = ifi {
      if ifi != 0 {
        sockopt::set_ipv6_multicast_if(&sock, ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn multicast_udp4_socket<N: Net>(
    ifi: Option<Ipv4Addr>,
    port: u16,
  ) -> io::Result<N::UdpSocket> {
    let sock = socket(AddressFamily::INET, SocketType::DGRAM, Some(ipproto::UDP))?;
    sockopt::set_socket_reuseaddr(&sock, true)?;
    sockopt::set_socket_reuseport(&sock, true)?;

    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
    bind(&sock, &addr)?;

    if let Some(ifi) = ifi {
      if !ifi.is_unspecified() {
        sockopt::set_ip_multicast_if(&sock, &ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    match ifi {
      Some(ifi) if !ifi.is_unspecified() => sock.join_multicast_v4(&IPV4_MDNS, &ifi)?,
      _ => {
        for addr in local_ipv4_addrs()? {
          sock.join_multicast_v4(&IPV4_MDNS, &addr)?;
        }
      }
    }
    sock.set_multicast_loop_v4(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn multicast_udp6_socket<N: Net>(
    ifi: Option<u32>,
    port: u16,
  ) -> io::Result<N::UdpSocket> {
    let sock = socket(AddressFamily::INET6, SocketType::DGRAM, Some(ipproto::UDP))?;
    sockopt::set_socket_reuseaddr(&sock, true)?;
    sockopt::set_socket_reuseport(&sock, true)?;
    sockopt::set_ipv6_v6only(&sock, true)?;

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    bind(&sock, &addr)?;

    if let Some(ifi) = ifi {
      if ifi != 0 {
        sockopt::set_ipv6_multicast_if(&sock, ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    match ifi {
      Some(ifi) if ifi != 0 => sock.join_multicast_v6(&IPV6_MDNS, ifi)?,
      _ => {
        for scope_id in local_ipv6_scopes()? {
          sock.join_multicast_v6(&IPV6_MDNS, scope_id)?;
        }
      }
    }
    sock.set_multicast_loop_v6(true)?;
    sock.set_nonblocking(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }
}

#[cfg(windows)]
pub(crate) use windows_impl::*;

#[cfg(windows)]
mod windows_impl {
  use super::*;
  use socket2::{Domain, Protocol, Socket, Type};

  pub(crate) fn unicast_udp4_socket<N: Net>(ifi: Option<Ipv4Addr>) -> io::Result<N::UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, 0).into();
    sock.bind(&addr.into())?;

    if let Some(ifi) = ifi {
      if !ifi.is_unspecified() {
        sock.set_multicast_if_v4(&ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn unicast_udp6_socket<N: Net>(ifi: Option<u32>) -> io::Result<N::UdpSocket> {
    let sock = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_only_v6(true)?;
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, 0).into();
    sock.bind(&addr.into())?;

    if let Some(ifi) = ifi {
      if ifi != 0 {
        sock.set_multicast_if_v6(ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn multicast_udp4_socket<N: Net>(
    ifi: Option<Ipv4Addr>,
    port: u16,
  ) -> io::Result<N::UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
    sock.bind(&addr.into())?;

    if let Some(ifi) = ifi {
      if !ifi.is_unspecified() {
        sock.set_multicast_if_v4(&ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    sock.set_nonblocking(true)?;
    match ifi {
      Some(ifi) if !ifi.is_unspecified() => sock.join_multicast_v4(&IPV4_MDNS, &ifi)?,
      _ => {
        for addr in local_ipv4_addrs()? {
          sock.join_multicast_v4(&IPV4_MDNS, &addr)?;
        }
      }
    }
    sock.set_multicast_loop_v4(true)?;

    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }

  pub(crate) fn multicast_udp6_socket<N: Net>(
    ifi: Option<u32>,
    port: u16,
  ) -> io::Result<N::UdpSocket> {
    let sock = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    sock.set_only_v6(true)?;
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    sock.bind(&addr.into())?;

    if let Some(ifi) = ifi {
      if ifi != 0 {
        sock.set_multicast_if_v6(ifi)?;
      }
    }

    let sock = StdUdpSocket::from(sock);
    match ifi {
      Some(ifi) if ifi != 0 => sock.join_multicast_v6(&IPV6_MDNS, ifi)?,
      _ => {
        for scope_id in local_ipv6_scopes()? {
          sock.join_multicast_v6(&IPV6_MDNS, scope_id)?;
        }
      }
    }
    sock.set_multicast_loop_v6(true)?;
    sock.set_nonblocking(true)?;

    <N::UdpSocket as TryFrom<_>>::try_from(sock)
  }
}

/// Every unicast address currently configured on a local, non-loopback
/// interface, used by the transport's self-receipt filter (RFC 6762 §11:
/// a responder must recognize and discard its own multicast transmissions
/// reflected back to it) and by [`local_if_index_for`] below.
pub(crate) fn local_addresses() -> io::Result<Vec<IpAddr>> {
  Ok(
    if_addrs::get_if_addrs()?
      .into_iter()
      .map(|iface| iface.ip())
      .collect(),
  )
}

/// The OS interface index backing `ip`, if any local interface currently
/// carries it. Used to resolve a caller-supplied `Ipv4Addr`/`u32` scope
/// hint back to a concrete `if_index` for outgoing record tagging.
pub(crate) fn if_index_for(ip: IpAddr) -> io::Result<Option<u32>> {
  Ok(
    if_addrs::get_if_addrs()?
      .into_iter()
      .find(|iface| iface.ip() == ip)
      .and_then(|iface| iface.index),
  )
}
