//! Crate-level error type.
use mdns_proto::error::ProtoError;

use crate::rdata::RdataError;

/// Everything that can go wrong using this crate, folding in the lower
/// layers' errors rather than asking callers to match on several error
/// types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A caller-supplied [`crate::api::Flags`] combination is not valid for
  /// the operation it was passed to (e.g. both `Add` and `Default` set).
  #[error("invalid flags: {0}")]
  BadFlags(&'static str),
  /// The transport failed to bind or join the multicast group on every
  /// interface/address-family it tried.
  #[error("failed to initialize transport: {0}")]
  TransportInit(std::io::Error),
  /// Wire encoding or decoding failed.
  #[error(transparent)]
  Codec(#[from] ProtoError),
  /// A record's rdata could not be built or parsed.
  #[error(transparent)]
  Rdata(#[from] RdataError),
  /// Probing a `Unique` record found another responder already answering
  /// for it with different data.
  #[error("name conflict while registering {0}")]
  PublishConflict(smol_str::SmolStr),
  /// An I/O error not specific to transport initialization.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// Convenient alias for fallible operations in this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
