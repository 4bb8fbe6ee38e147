use core::error::Error;

use std::{
  io,
  net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs},
  sync::atomic::{AtomicU32, Ordering},
};

use super::{invalid_input_err, is_fqdn};

use mdns_proto::Label;
use smallvec_wrapper::TinyVec;
use smol_str::{SmolStr, ToSmolStr, format_smolstr};
use triomphe::Arc;

use crate::{
  rdata::{PTR, Rdata, SRV, TXT},
  record::{Kind, Name, Record},
};

const DEFAULT_TTL: u32 = 120;

/// The error of the service
#[derive(Debug, thiserror::Error)]
enum ServiceError {
  /// Service port is missing
  #[error("missing service port")]
  PortNotFound,
  /// Cannot determine the host ip addresses for the host name
  #[error("could not determine the host ip addresses for {hostname}: {error}")]
  IpNotFound {
    /// the host name
    hostname: SmolStr,
    /// the error
    #[source]
    error: Box<dyn Error + Send + Sync + 'static>,
  },
  /// Not a fully qualified domain name
  #[error("{0} is not a fully qualified domain name")]
  NotFQDN(SmolStr),
}

/// A builder for creating a new [`Service`].
pub struct ServiceBuilder<'a> {
  instance: Label<'a>,
  service: Label<'a>,
  domain: Option<Label<'a>>,
  hostname: Option<Label<'a>>,
  port: Option<u16>,
  ipv4s: TinyVec<Ipv4Addr>,
  ipv6s: TinyVec<Ipv6Addr>,
  txt: TinyVec<SmolStr>,
  ttl: u32,
  srv_priority: u16,
  srv_weight: u16,
}

impl<'a> ServiceBuilder<'a> {
  /// Returns a new ServiceBuilder with default values.
  pub fn new(instance: Label<'a>, service: Label<'a>) -> Self {
    Self {
      instance,
      service,
      domain: None,
      hostname: None,
      port: None,
      ipv4s: TinyVec::new(),
      ipv6s: TinyVec::new(),
      txt: TinyVec::new(),
      ttl: DEFAULT_TTL,
      srv_priority: 10,
      srv_weight: 1,
    }
  }

  /// Gets the current instance name.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert_eq!(builder.instance().as_str(), "hostname");
  /// ```
  pub fn instance(&self) -> &Label<'a> {
    &self.instance
  }

  /// Gets the current service name.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert_eq!(builder.service().as_str(), "_http._tcp");
  /// ```
  pub fn service(&self) -> &Label<'a> {
    &self.service
  }

  /// Gets the current domain.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  ///
  /// assert!(builder.domain().is_none());
  /// ```
  pub fn domain(&self) -> Option<&Label<'a>> {
    self.domain.as_ref()
  }

  /// Sets the domain for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_domain("local.".into());
  ///
  /// assert_eq!(builder.domain().unwrap().as_str(), "local.");
  /// ```
  pub fn with_domain(mut self, domain: Label<'a>) -> Self {
    self.domain = Some(domain);
    self
  }

  /// Gets the current host name.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_hostname("testhost.".into());
  ///
  /// assert_eq!(builder.hostname().unwrap().as_str(), "testhost.");
  /// ```
  pub fn hostname(&self) -> Option<&Label<'a>> {
    self.hostname.as_ref()
  }

  /// Sets the host name for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_hostname("testhost.".into());
  /// ```
  pub fn with_hostname(mut self, hostname: Label<'a>) -> Self {
    self.hostname = Some(hostname);
    self
  }

  /// Gets the TTL.
  ///
  /// Defaults to `120` seconds.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert_eq!(builder.ttl(), 120);
  ///
  /// let builder = builder.with_ttl(60);
  /// assert_eq!(builder.ttl(), 60);
  /// ```
  pub fn ttl(&self) -> u32 {
    self.ttl
  }

  /// Sets the TTL for the service.
  ///
  /// Defaults to `120` seconds.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_ttl(60);
  /// ```
  pub fn with_ttl(mut self, ttl: u32) -> Self {
    self.ttl = ttl;
    self
  }

  /// Gets the priority for SRV records.
  ///
  /// Defaults to `10`.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert_eq!(builder.srv_priority(), 10);
  ///
  /// let builder = builder.with_srv_priority(5);
  /// assert_eq!(builder.srv_priority(), 5);
  /// ```
  pub fn srv_priority(&self) -> u16 {
    self.srv_priority
  }

  /// Sets the priority for SRV records.
  ///
  /// Defaults to `10`.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_srv_priority(5);
  /// ```
  pub fn with_srv_priority(mut self, priority: u16) -> Self {
    self.srv_priority = priority;
    self
  }

  /// Gets the weight for SRV records.
  ///
  /// Defaults to `1`.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert_eq!(builder.srv_weight(), 1);
  ///
  /// let builder = builder.with_srv_weight(5);
  /// assert_eq!(builder.srv_weight(), 5);
  /// ```
  pub fn srv_weight(&self) -> u16 {
    self.srv_weight
  }

  /// Sets the weight for SRV records.
  ///
  /// Defaults to `1`.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_srv_weight(5);
  /// ```
  pub fn with_srv_weight(mut self, weight: u16) -> Self {
    self.srv_weight = weight;
    self
  }

  /// Gets the current port.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert!(builder.port().is_none());
  /// ```
  pub fn port(&self) -> Option<u16> {
    self.port
  }

  /// Sets the port for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_port(80);
  /// ```
  pub fn with_port(mut self, port: u16) -> Self {
    self.port = Some(port);
    self
  }

  /// Gets the current IPv4 addresses.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  /// use std::net::IpAddr;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert!(builder.ipv4s().is_empty());
  ///
  /// let builder = builder.with_ip("192.168.0.1".parse().unwrap());
  ///
  /// assert_eq!(builder.ipv4s(), &["192.168.0.1".parse().unwrap()]);
  /// ```
  pub fn ipv4s(&self) -> &[Ipv4Addr] {
    &self.ipv4s
  }

  /// Gets the current IPv6 addresses.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  /// use std::net::IpAddr;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert!(builder.ipv6s().is_empty());
  ///
  /// let builder = builder.with_ip("::1".parse().unwrap());
  ///
  /// assert_eq!(builder.ipv6s(), &["::1".parse().unwrap()]);
  /// ```
  pub fn ipv6s(&self) -> &[Ipv6Addr] {
    &self.ipv6s
  }

  /// Sets the IPv4 addresses for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_ipv4s(["192.168.0.1".parse().unwrap()].into_iter().collect());
  /// ```
  pub fn with_ipv4s(mut self, ips: TinyVec<Ipv4Addr>) -> Self {
    self.ipv4s = ips;
    self
  }

  /// Sets the IPv6 addresses for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_ipv6s(["::1".parse().unwrap()].into_iter().collect());
  /// ```
  pub fn with_ipv6s(mut self, ips: TinyVec<Ipv6Addr>) -> Self {
    self.ipv6s = ips;
    self
  }

  /// Pushes an IP address to the list of IP addresses.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::ServiceBuilder;
  /// use std::net::IpAddr;
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///  .with_ip(IpAddr::V4("192.168.0.1".parse().unwrap()));
  /// ```
  pub fn with_ip(mut self, ip: IpAddr) -> Self {
    match ip {
      IpAddr::V4(ip) => self.ipv4s.push(ip),
      IpAddr::V6(ip) => self.ipv6s.push(ip),
    }
    self
  }

  /// Gets the current TXT records.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::{ServiceBuilder, SmolStr};
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into());
  /// assert!(builder.txt_records().is_empty());
  ///
  /// let builder = builder.with_txt_record("info".into());
  ///
  /// assert_eq!(builder.txt_records(), &[SmolStr::new("info")]);
  /// ```
  pub fn txt_records(&self) -> &[SmolStr] {
    &self.txt
  }

  /// Sets the TXT records for the service.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::{ServiceBuilder, SmolStr};
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///   .with_txt_records([SmolStr::new("info")].into_iter().collect());
  /// ```
  pub fn with_txt_records(mut self, txt: TinyVec<SmolStr>) -> Self {
    self.txt = txt;
    self
  }

  /// Pushes a TXT record to the list of TXT records.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use mdns_responder::{ServiceBuilder, SmolStr};
  ///
  /// let builder = ServiceBuilder::new("hostname".into(), "_http._tcp".into())
  ///  .with_txt_record("info".into());
  /// ```
  pub fn with_txt_record(mut self, txt: SmolStr) -> Self {
    self.txt.push(txt);
    self
  }

  /// Finalize the builder and try to create a new [`Service`].
  // TODO(reddaly): This interface may need to change to account for "unique
  // record" conflict rules of the mDNS protocol.  Upon startup, the server should
  // check to ensure that the instance name does not conflict with other instance
  // names, and, if required, select a new name.  There may also be conflicting
  // hostName A/AAAA records.
  pub fn finalize(self) -> io::Result<Service> {
    let domain = self.domain.as_ref().map(|d| format_smolstr!("{}.", d));
    let domain = match domain {
      Some(domain) if !is_fqdn(domain.as_str()) => {
        return Err(invalid_input_err(ServiceError::NotFQDN(domain)));
      }
      Some(domain) => domain,
      None => "local".into(),
    };

    let hostname = self.hostname.as_ref().map(|h| format_smolstr!("{}.", h));
    let hostname = match hostname {
      Some(hostname) if !hostname.is_empty() => {
        if !is_fqdn(hostname.as_str()) {
          return Err(invalid_input_err(ServiceError::NotFQDN(hostname)));
        }
        hostname
      }
      _ => super::hostname_fqdn()?,
    };

    let port = match self.port {
      None | Some(0) => return Err(invalid_input_err(ServiceError::PortNotFound)),
      Some(port) => port,
    };

    let (ipv4s, ipv6s) = if self.ipv4s.is_empty() && self.ipv6s.is_empty() {
      let tmp_hostname = format_smolstr!("{}.{}", hostname, domain);

      let mut ipv4s = TinyVec::new();
      let mut ipv6s = TinyVec::new();
      tmp_hostname
        .as_str()
        .to_socket_addrs()
        .map_err(|e| {
          invalid_input_err(ServiceError::IpNotFound {
            hostname: tmp_hostname,
            error: e.into(),
          })
        })?
        .for_each(|addr| match addr.ip() {
          IpAddr::V4(ip) => ipv4s.push(ip),
          IpAddr::V6(ip) => ipv6s.push(ip),
        });

      (ipv4s, ipv6s)
    } else {
      (self.ipv4s, self.ipv6s)
    };

    let trimmed_domain = domain.as_str().trim_matches('.');
    let service_addr = format_smolstr!("{}.{}.", self.service, trimmed_domain);
    let instance_addr = format_smolstr!("{}.{}.{}.", self.instance, self.service, trimmed_domain);
    let enum_addr = format_smolstr!("_services._dns-sd._udp.{}.", trimmed_domain);

    let srv = SRV::new(self.srv_priority, self.srv_weight, port, hostname.clone())
      .map_err(invalid_input_err)?;

    Ok(Service {
      instance: self.instance.to_smolstr(),
      service: self.service.to_smolstr(),
      domain,
      hostname,
      ipv4s,
      ipv6s,
      txt: TXT::new(Arc::from_iter(self.txt)).map_err(invalid_input_err)?,
      service_addr: PTR::new(service_addr).map_err(invalid_input_err)?,
      instance_addr: PTR::new(instance_addr).map_err(invalid_input_err)?,
      enum_addr: PTR::new(enum_addr).map_err(invalid_input_err)?,
      ttl: AtomicU32::new(self.ttl),
      srv,
    })
  }
}

/// A self-published service: an instance name, its host's address
/// records, and the PTR/SRV/TXT records that tie them together, per
/// RFC 6763 §4's four-record pattern.
#[derive(Debug)]
pub struct Service {
  /// Instance name (e.g. "hostService name")
  instance: SmolStr,
  /// Service name (e.g. "_http._tcp.")
  service: SmolStr,
  /// If blank, assumes "local"
  domain: SmolStr,
  /// Host machine DNS name (e.g. "mymachine.net")
  hostname: SmolStr,
  /// IP addresses for the service's host
  ipv4s: TinyVec<Ipv4Addr>,
  ipv6s: TinyVec<Ipv6Addr>,

  /// Service TXT records
  txt: TXT,
  /// Fully qualified service address
  service_addr: PTR,
  /// Fully qualified instance address
  instance_addr: PTR,
  /// _services._dns-sd._udp.<domain>
  enum_addr: PTR,
  ttl: AtomicU32,
  srv: SRV,
}

impl Service {
  /// Returns the instance of the service.
  #[inline]
  pub const fn instance(&self) -> &SmolStr {
    &self.instance
  }

  /// Returns the service of the mdns service.
  #[inline]
  pub const fn service(&self) -> &SmolStr {
    &self.service
  }

  /// Returns the domain of the mdns service.
  #[inline]
  pub const fn domain(&self) -> &SmolStr {
    &self.domain
  }

  /// Returns the hostname of the mdns service.
  #[inline]
  pub const fn hostname(&self) -> &SmolStr {
    &self.hostname
  }

  /// Returns the port of the mdns service.
  #[inline]
  pub fn port(&self) -> u16 {
    self.srv.port()
  }

  /// Returns the TTL of the mdns service.
  #[inline]
  pub fn ttl(&self) -> u32 {
    self.ttl.load(Ordering::Acquire)
  }

  /// Returns the IPv4 addresses of the mdns service.
  #[inline]
  pub fn ipv4s(&self) -> &[Ipv4Addr] {
    &self.ipv4s
  }

  /// Returns the IPv6 addresses of the mdns service.
  #[inline]
  pub fn ipv6s(&self) -> &[Ipv6Addr] {
    &self.ipv6s
  }

  /// Returns the TXT records of the mdns service.
  #[inline]
  pub fn txt_records(&self) -> &[SmolStr] {
    self.txt.strings()
  }

  /// Builds every record this service answers queries with, owned and
  /// ready to hand to [`crate::api::Handle::register`] one at a time (a
  /// PTR pointing at the instance, the instance's SRV/TXT, and an A/AAAA
  /// per resolved address), the RFC 6763 §4 four-record pattern. This
  /// responder's registry (see [`crate::engine::Core`]) holds records
  /// rather than re-deriving them from a [`Service`] on every incoming
  /// question, so this is called once, up front, at registration time.
  pub fn records(&self, if_index: i32) -> Vec<Record> {
    let mut records = Vec::with_capacity(4 + self.ipv4s.len() + self.ipv6s.len());

    records.push(Record::new(
      if_index,
      Name::new(self.enum_addr.name().to_smolstr()),
      Kind::Shared,
      Rdata::Ptr(self.service_addr.clone()),
      self.ttl(),
    ));
    records.push(Record::new(
      if_index,
      Name::new(self.service_addr.name().to_smolstr()),
      Kind::Shared,
      Rdata::Ptr(self.instance_addr.clone()),
      self.ttl(),
    ));
    records.push(Record::new(
      if_index,
      Name::new(self.instance_addr.name().to_smolstr()),
      Kind::Unique,
      Rdata::Srv(self.srv.clone()),
      self.ttl(),
    ));
    records.push(Record::new(
      if_index,
      Name::new(self.instance_addr.name().to_smolstr()),
      Kind::Unique,
      Rdata::Txt(self.txt.clone()),
      self.ttl(),
    ));
    for ip in self.ipv4s.iter() {
      records.push(Record::new(
        if_index,
        Name::new(self.hostname.clone()),
        Kind::Unique,
        Rdata::A(*ip),
        self.ttl(),
      ));
    }
    for ip in self.ipv6s.iter() {
      records.push(Record::new(
        if_index,
        Name::new(self.hostname.clone()),
        Kind::Unique,
        Rdata::Aaaa(*ip),
        self.ttl(),
      ));
    }

    records
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn builder() -> ServiceBuilder<'static> {
    ServiceBuilder::new("myhost".into(), "_http._tcp".into())
      .with_domain("local".into())
      .with_hostname("myhost".into())
      .with_port(8080)
      .with_ip(Ipv4Addr::new(192, 168, 1, 42).into())
      .with_txt_record("path=/index.html".into())
  }

  #[test]
  fn finalize_rejects_missing_port() {
    let err = ServiceBuilder::new("myhost".into(), "_http._tcp".into())
      .with_ip(Ipv4Addr::new(192, 168, 1, 42).into())
      .finalize()
      .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
  }

  #[test]
  fn finalize_defaults_to_the_local_domain() {
    let svc = ServiceBuilder::new("myhost".into(), "_http._tcp".into())
      .with_hostname("myhost".into())
      .with_port(8080)
      .with_ip(Ipv4Addr::new(192, 168, 1, 42).into())
      .finalize()
      .unwrap();
    assert_eq!(svc.domain().as_str(), "local");
  }

  #[test]
  fn finalize_builds_instance_service_and_host_names() {
    let svc = builder().finalize().unwrap();
    assert_eq!(svc.instance().as_str(), "myhost");
    assert_eq!(svc.service().as_str(), "_http._tcp");
    assert_eq!(svc.domain().as_str(), "local.");
    assert_eq!(svc.hostname().as_str(), "myhost.");
    assert_eq!(svc.port(), 8080);
    assert_eq!(svc.ipv4s(), &[Ipv4Addr::new(192, 168, 1, 42)]);
    assert_eq!(svc.txt_records(), &["path=/index.html".to_smolstr()]);
  }

  #[test]
  fn records_follow_the_rfc_6763_four_record_pattern() {
    let svc = builder().finalize().unwrap();
    let records = svc.records(0);

    // Enumeration PTR, service PTR, SRV, TXT, plus one A per address.
    assert_eq!(records.len(), 5);

    assert_eq!(records[0].name.as_str(), "_services._dns-sd._udp.local.");
    assert_eq!(records[0].kind, Kind::Shared);
    assert!(matches!(records[0].data, Rdata::Ptr(_)));

    assert_eq!(records[1].name.as_str(), "_http._tcp.local.");
    assert_eq!(records[1].kind, Kind::Shared);
    assert!(matches!(records[1].data, Rdata::Ptr(_)));

    assert_eq!(records[2].name.as_str(), "myhost._http._tcp.local.");
    assert_eq!(records[2].kind, Kind::Unique);
    assert!(matches!(records[2].data, Rdata::Srv(_)));

    assert_eq!(records[3].name.as_str(), "myhost._http._tcp.local.");
    assert_eq!(records[3].kind, Kind::Unique);
    assert!(matches!(records[3].data, Rdata::Txt(_)));

    assert_eq!(records[4].name.as_str(), "myhost.");
    assert_eq!(records[4].kind, Kind::Unique);
    match &records[4].data {
      Rdata::A(ip) => assert_eq!(*ip, Ipv4Addr::new(192, 168, 1, 42)),
      other => panic!("expected an A record, got {other:?}"),
    }

    for record in &records {
      // `Record::new` applies RFC 6762 §5.2's 0..2% anti-sync jitter.
      assert!((120..=122).contains(&record.ttl), "ttl was {}", record.ttl);
    }
  }
}
