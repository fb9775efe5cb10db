//! Service error type.
//!
//! Domain rejections pass through as [`tiltyard_core::Error`]; anything the
//! storage backend raises is boxed behind [`Error::Store`] so the service
//! stays generic over backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] tiltyard_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether this is a domain rejection the caller can act on, as opposed
  /// to a backend failure.
  pub fn is_domain(&self) -> bool { matches!(self, Self::Core(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
