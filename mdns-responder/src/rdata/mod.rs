//! Owned representations of the record data this responder understands.
//!
//! Everything that crosses the wire in `mdns-proto` borrows from the packet
//! it was parsed out of (`Label<'a>`, `&'a [u8]`). Records in [`RecordStore`]
//! need to outlive the datagram they arrived in, so every variant here
//! stores its own encoded bytes and exposes a stable, canonical
//! [`core::fmt::Display`] used as the record's stringification-as-identity
//! key (see the crate-level docs for the caveat that caveat carries).
//!
//! [`RecordStore`]: crate::store::RecordStore

use core::{
  fmt,
  net::{Ipv4Addr, Ipv6Addr},
};
use std::borrow::Cow;

use mdns_proto::{Cursor, Deserialize, Label, ResourceType, error::ProtoError};
use smol_str::SmolStr;

mod ptr;
mod srv;
mod txt;

pub use ptr::PTR;
pub use srv::SRV;
pub use txt::TXT;

/// Errors constructing or parsing record data.
#[derive(Debug, thiserror::Error)]
pub enum RdataError {
  /// A TXT record's character-string content exceeded 255 bytes.
  #[error("TXT record character-string is too long")]
  TxtDataTooLong,
  /// The wire payload did not have the length the record type requires.
  #[error("record data has the wrong length for its type")]
  WrongLength,
  /// Label/name decoding or encoding failed.
  #[error(transparent)]
  Proto(#[from] ProtoError),
}

/// An owned, type-dispatched view of a record's RDATA.
///
/// Each variant is cheap to clone (the wrapped types intern their encoded
/// bytes behind a reference-counted buffer) and carries both the semantic
/// value (used for conflict/equality comparisons and for building
/// `ServiceResolved`/`ServiceUpdate`-style callback payloads) and the
/// pre-encoded wire bytes handed to [`mdns_proto::ResourceRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rdata {
  /// A 32-bit IPv4 address.
  A(Ipv4Addr),
  /// A 128-bit IPv6 address.
  Aaaa(Ipv6Addr),
  /// A pointer to another name.
  Ptr(PTR),
  /// A service location record.
  Srv(SRV),
  /// A bag of TXT character-strings.
  Txt(TXT),
}

impl Rdata {
  /// The [`ResourceType`] this rdata corresponds to.
  #[inline]
  pub const fn ty(&self) -> ResourceType {
    match self {
      Self::A(_) => ResourceType::A,
      Self::Aaaa(_) => ResourceType::AAAA,
      Self::Ptr(_) => ResourceType::Ptr,
      Self::Srv(_) => ResourceType::Srv,
      Self::Txt(_) => ResourceType::Txt,
    }
  }

  /// Returns the bytes that should be written into an outgoing
  /// [`mdns_proto::ResourceRecord`]'s RDATA section.
  pub fn wire(&self) -> Cow<'_, [u8]> {
    match self {
      Self::A(ip) => Cow::Owned(ip.octets().to_vec()),
      Self::Aaaa(ip) => Cow::Owned(ip.octets().to_vec()),
      Self::Ptr(ptr) => Cow::Borrowed(ptr.data()),
      Self::Srv(srv) => Cow::Borrowed(srv.data()),
      Self::Txt(txt) => Cow::Borrowed(txt.data()),
    }
  }

  /// Parses an owned [`Rdata`] from a wire record's raw RDATA bytes.
  ///
  /// `owner` is the record's owner name, needed by [`SRV`] to reject a
  /// target that fails to decode.
  pub fn from_wire(ty: ResourceType, data: &[u8]) -> Result<Self, RdataError> {
    match ty {
      ResourceType::A => {
        let octets: [u8; 4] = data.try_into().map_err(|_| RdataError::WrongLength)?;
        Ok(Self::A(Ipv4Addr::from(octets)))
      }
      ResourceType::AAAA => {
        let octets: [u8; 16] = data.try_into().map_err(|_| RdataError::WrongLength)?;
        Ok(Self::Aaaa(Ipv6Addr::from(octets)))
      }
      ResourceType::Ptr => {
        // RFC 6762 responders commonly leave PTR targets uncompressed inside
        // a single-RR RDATA section; a target that relies on a compression
        // pointer into the surrounding message cannot be resolved from this
        // isolated slice and is reported as a decode error.
        let mut target = Label::default();
        let _ = target.deserialize(Cursor::new(data))?;
        Ok(Self::Ptr(PTR::new(SmolStr::new(target.to_string()))?))
      }
      ResourceType::Srv => {
        if data.len() < 6 {
          return Err(RdataError::WrongLength);
        }
        let priority = u16::from_be_bytes([data[0], data[1]]);
        let weight = u16::from_be_bytes([data[2], data[3]]);
        let port = u16::from_be_bytes([data[4], data[5]]);
        let mut target = Label::default();
        let _ = target.deserialize(Cursor::new(&data[6..]))?;
        Ok(Self::Srv(SRV::new(
          priority,
          weight,
          port,
          SmolStr::new(target.to_string()),
        )?))
      }
      ResourceType::Txt => {
        let (txt, _) = mdns_proto::decode_txt(data, 0)?;
        let mut strings = smallvec_wrapper::TinyVec::new();
        for s in txt.strings() {
          strings.push(SmolStr::new(s?.to_string()));
        }
        Ok(Self::Txt(TXT::new(triomphe::Arc::from_iter(strings))?))
      }
      _ => Err(RdataError::WrongLength),
    }
  }
}

impl fmt::Display for Rdata {
  /// A canonical, injective-enough-for-dedup stringification of the record
  /// data. This is the "stringification-as-identity" representation the
  /// design notes warn about: it is stable across the lifetime of a single
  /// process but is *not* a serialization format and must never be parsed
  /// back.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::A(ip) => write!(f, "A {ip}"),
      Self::Aaaa(ip) => write!(f, "AAAA {ip}"),
      Self::Ptr(ptr) => write!(f, "PTR {}", ptr.name()),
      Self::Srv(srv) => write!(
        f,
        "SRV {} {} {} {}",
        srv.priority(),
        srv.weight(),
        srv.port(),
        srv.target()
      ),
      Self::Txt(txt) => {
        write!(f, "TXT")?;
        for s in txt.strings() {
          write!(f, " {s}")?;
        }
        Ok(())
      }
    }
  }
}
