//! Radio abstraction for the BLE peripheral role.
//!
//! The advertising session and the bond controller never talk to a platform
//! stack directly. They go through the [`Radio`] trait, which reports
//! capability facts at call time, accepts encoded advertisements, and signals
//! start completion through a single-shot channel.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bluer::Address;
use tokio::sync::oneshot;

use crate::{
   advertising::{data::AdvertisingBuckets, request::AdvertisingSettings},
   bonding::BondState,
   error::Result,
};

pub mod bluez;
#[cfg(test)]
pub mod mock;

/// Capability facts reported by the radio at call time.
///
/// Unknown facts read as `false`; querying capabilities never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
   /// The platform stack exposes the LE advertising API at all.
   pub api_available: bool,
   /// The adapter exists and is powered.
   pub adapter_powered: bool,
   /// An advertising instance can be obtained right now.
   pub advertiser_present: bool,
   /// The adapter supports multiple concurrent advertisements.
   pub multi_advertisement: bool,
}

impl Capabilities {
   /// True iff advertising is possible at all.
   pub const fn advertising_supported(&self) -> bool {
      self.api_available && self.adapter_powered && self.advertiser_present && self.multi_advertisement
   }
}

/// Whether the platform advertise permission applies and has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
   /// No permission model applies on this platform; vacuously granted.
   #[default]
   NotRequired,
   Granted,
   Denied,
}

impl PermissionState {
   pub const fn granted(self) -> bool {
      !matches!(self, Self::Denied)
   }
}

/// Opaque handle tying one submitted advertisement to its radio resources.
///
/// The session exclusively owns the token for one start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvertiseToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl AdvertiseToken {
   pub fn fresh() -> Self {
      Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
   }
}

/// Terminal outcome of one submitted advertising start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
   Started,
   /// Opaque platform error code, passed through unreinterpreted.
   Failed(i32),
}

/// An accepted advertising submission awaiting its single completion.
#[derive(Debug)]
pub struct Submission {
   pub token: AdvertiseToken,
   pub completion: oneshot::Receiver<StartOutcome>,
}

/// Interface the core needs from the underlying BLE radio.
#[async_trait]
pub trait Radio: Send + Sync {
   /// Queries capability facts. Pure query, no side effects.
   async fn capabilities(&self) -> Capabilities;

   /// Queries the advertise permission. Pure query, no side effects.
   fn advertise_permission(&self) -> PermissionState;

   /// Submits an advertisement to the radio together with a fresh token.
   ///
   /// Exactly one [`StartOutcome`] is delivered on the returned completion
   /// channel. The submission itself may be refused synchronously.
   async fn submit(
      &self,
      settings: &AdvertisingSettings,
      buckets: &AdvertisingBuckets,
   ) -> Result<Submission>;

   /// Stops the advertisement bound to `token` and releases its resources.
   fn cancel(&self, token: AdvertiseToken) -> Result<()>;

   /// Resolves the bond state of a remote device.
   async fn bond_state(&self, address: Address) -> Result<BondState>;

   /// Requests pairing with a remote device. Returns whether the request was
   /// accepted for processing, not whether pairing ultimately succeeds.
   async fn create_bond(&self, address: Address) -> Result<bool>;
}
