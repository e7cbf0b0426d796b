//! BlueZ-backed radio.
//!
//! Maps submitted advertisements onto `bluer` advertisement registrations
//! and answers capability and bond queries from the adapter.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bluer::{
   Adapter, Address, ErrorKind,
   adv::{Advertisement, AdvertisementHandle, Feature, Type},
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
   advertising::{
      data::AdvertisingBuckets,
      request::{ADVERTISE_INTERVAL, AdvertisingSettings},
   },
   bonding::BondState,
   error::{PeripheralError, Result},
   radio::{AdvertiseToken, Capabilities, PermissionState, Radio, StartOutcome, Submission},
};

/// Registration lifecycle of one token. A pending entry whose token
/// disappears was cancelled before BlueZ confirmed; the late handle is
/// dropped on arrival.
enum Registration {
   Pending,
   Active(AdvertisementHandle),
}

/// Radio implementation on top of a BlueZ adapter.
pub struct BluerRadio {
   adapter: Adapter,
   registrations: Arc<Mutex<HashMap<AdvertiseToken, Registration>>>,
}

impl BluerRadio {
   pub fn new(adapter: Adapter) -> Self {
      Self {
         adapter,
         registrations: Arc::new(Mutex::new(HashMap::new())),
      }
   }

   fn advertisement(settings: &AdvertisingSettings, buckets: &AdvertisingBuckets) -> Advertisement {
      let local_name = if buckets.include_device_name() {
         buckets.local_name().map(str::to_string)
      } else {
         None
      };
      // Without an explicit name the system fills in the adapter alias
      let system_includes = if buckets.include_device_name() && local_name.is_none() {
         std::iter::once(Feature::LocalName).collect()
      } else {
         Default::default()
      };

      let mut adv = Advertisement {
         advertisement_type: if settings.connectable {
            Type::Peripheral
         } else {
            Type::Broadcast
         },
         discoverable: Some(true),
         local_name,
         system_includes,
         tx_power: Some(settings.tx_power.dbm()),
         min_interval: Some(ADVERTISE_INTERVAL),
         max_interval: Some(ADVERTISE_INTERVAL),
         ..Default::default()
      };
      if let Some(uuid) = buckets.service_uuid() {
         adv.service_uuids.insert(uuid);
      }
      if let Some((id, data)) = buckets.manufacturer() {
         adv.manufacturer_data.insert(id, data.to_vec());
      }
      adv
   }
}

/// Collapses a BlueZ registration error into the opaque start failure code
/// the surface reports.
fn start_failure_code(err: &bluer::Error) -> i32 {
   match err.kind {
      ErrorKind::AlreadyExists | ErrorKind::InProgress => 3,
      ErrorKind::NotSupported => 5,
      ErrorKind::NotReady | ErrorKind::NotAvailable => 2,
      _ => 4,
   }
}

#[async_trait]
impl Radio for BluerRadio {
   async fn capabilities(&self) -> Capabilities {
      let api_available = self.adapter.address().await.is_ok();
      let adapter_powered = self.adapter.is_powered().await.unwrap_or(false);
      let supported = self
         .adapter
         .supported_advertising_instances()
         .await
         .unwrap_or(0);
      let active = self
         .adapter
         .active_advertising_instances()
         .await
         .unwrap_or(supported);

      Capabilities {
         api_available,
         adapter_powered,
         advertiser_present: supported > active,
         multi_advertisement: supported > 1,
      }
   }

   fn advertise_permission(&self) -> PermissionState {
      // BlueZ has no per-caller advertise permission model
      PermissionState::NotRequired
   }

   async fn submit(
      &self,
      settings: &AdvertisingSettings,
      buckets: &AdvertisingBuckets,
   ) -> Result<Submission> {
      let adv = Self::advertisement(settings, buckets);
      let token = AdvertiseToken::fresh();
      let (tx, rx) = oneshot::channel();
      self.registrations.lock().insert(token, Registration::Pending);

      let adapter = self.adapter.clone();
      let registrations = self.registrations.clone();
      tokio::spawn(async move {
         match adapter.advertise(adv).await {
            Ok(handle) => {
               let mut registrations = registrations.lock();
               if registrations.contains_key(&token) {
                  debug!("Advertisement registered as {token:?}");
                  registrations.insert(token, Registration::Active(handle));
                  drop(registrations);
                  let _ = tx.send(StartOutcome::Started);
               } else {
                  // Cancelled while BlueZ was confirming; unregister
                  drop(registrations);
                  drop(handle);
               }
            },
            Err(e) => {
               warn!("Advertisement registration failed: {e}");
               registrations.lock().remove(&token);
               let _ = tx.send(StartOutcome::Failed(start_failure_code(&e)));
            },
         }
      });

      Ok(Submission {
         token,
         completion: rx,
      })
   }

   fn cancel(&self, token: AdvertiseToken) -> Result<()> {
      match self.registrations.lock().remove(&token) {
         // Dropping an active handle unregisters the advertisement; a
         // pending registration is dropped by its task on arrival
         Some(registration) => {
            drop(registration);
            Ok(())
         },
         None => Err(PeripheralError::HardwareStop(format!(
            "no active advertisement for {token:?}"
         ))),
      }
   }

   async fn bond_state(&self, address: Address) -> Result<BondState> {
      let device = self.adapter.device(address)?;
      match device.is_paired().await {
         Ok(true) => Ok(BondState::Bonded),
         Ok(false) => Ok(BondState::Unbonded),
         // A valid but unseen address reads as unbonded, matching the
         // surface contract
         Err(e) if matches!(e.kind, ErrorKind::DoesNotExist) => Ok(BondState::Unbonded),
         Err(e) => Err(e.into()),
      }
   }

   async fn create_bond(&self, address: Address) -> Result<bool> {
      let device = self.adapter.device(address)?;
      if device.is_paired().await.unwrap_or(false) {
         return Ok(false);
      }

      // Pairing runs to completion in the background; only acceptance is
      // reported here.
      tokio::spawn(async move {
         match device.pair().await {
            Ok(()) => info!("Paired with {address}"),
            Err(e) => warn!("Pairing with {address} failed: {e}"),
         }
      });
      Ok(true)
   }
}
