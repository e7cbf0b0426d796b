//! Error types for the peripheral service.
//!
//! This module defines all error types that can occur while driving the
//! advertising session and the bonding helpers, together with their mapping
//! onto D-Bus error replies.

use thiserror::Error;

/// Main error type for the peripheral service.
#[derive(Error, Debug)]
pub enum PeripheralError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),

   #[error("BLE advertising requires an LE-capable adapter")]
   UnsupportedApi,

   #[error("Advertise permission not granted")]
   PermissionDenied,

   #[error("BLE advertiser not available")]
   NoAdvertiser,

   #[error("An advertising operation is already in flight")]
   ConcurrentStart,

   #[error("Invalid arguments: {0}")]
   InvalidArguments(String),

   #[error("Missing required argument '{0}'")]
   MissingArgument(&'static str),

   #[error("Invalid device id: {0}")]
   InvalidDeviceId(String),

   #[error("{bucket} payload is {size} bytes, limit is {limit}")]
   PayloadTooLarge {
      bucket: &'static str,
      size: usize,
      limit: usize,
   },

   #[error("Radio failed to start advertising: code {0}")]
   HardwareStart(i32),

   #[error("Radio failed to stop advertising: {0}")]
   HardwareStop(String),

   #[error("Radio dropped the start completion")]
   CompletionLost,

   #[error("Request timeout")]
   RequestTimeout,
}

impl PeripheralError {
   /// Stable code string reported to surface clients alongside the message.
   pub const fn code(&self) -> &'static str {
      match self {
         Self::UnsupportedApi => "API",
         Self::PermissionDenied => "PERMISSION",
         Self::NoAdvertiser => "NO_ADVERTISER",
         Self::ConcurrentStart => "BUSY",
         Self::InvalidArguments(_) => "ARGS",
         Self::MissingArgument(_) => "ARG",
         Self::InvalidDeviceId(_) => "DEV",
         Self::PayloadTooLarge { .. } => "PAYLOAD",
         Self::HardwareStart(_) | Self::CompletionLost => "START_FAIL",
         Self::HardwareStop(_) => "STOP_ERR",
         Self::RequestTimeout => "TIMEOUT",
         _ => "INTERNAL",
      }
   }
}

impl From<PeripheralError> for zbus::fdo::Error {
   fn from(err: PeripheralError) -> Self {
      let message = format!("{}: {err}", err.code());
      match err {
         PeripheralError::PermissionDenied => Self::AccessDenied(message),
         PeripheralError::UnsupportedApi => Self::NotSupported(message),
         PeripheralError::InvalidArguments(_)
         | PeripheralError::MissingArgument(_)
         | PeripheralError::InvalidDeviceId(_) => Self::InvalidArgs(message),
         _ => Self::Failed(message),
      }
   }
}

/// Convenience type alias for Results with `PeripheralError`.
pub type Result<T> = std::result::Result<T, PeripheralError>;
