//! Bond queries and pairing requests.
//!
//! Stateless helper that resolves a device identifier to an adapter handle
//! and either queries or initiates pairing. Independent of the advertising
//! state machine.

use std::{str::FromStr, sync::Arc};

use bluer::Address;
use log::{debug, info};

use crate::{
   error::{PeripheralError, Result},
   radio::Radio,
};

/// Bond state of a remote device. Wire values preserved from the platform
/// the surface contract originated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr, strum::Display)]
#[repr(u8)]
pub enum BondState {
   Unbonded = 10,
   Bonding = 11,
   Bonded = 12,
}

/// Resolves device identifiers and drives bond operations on the radio.
pub struct BondController {
   radio: Arc<dyn Radio>,
}

impl BondController {
   pub fn new(radio: Arc<dyn Radio>) -> Self {
      Self { radio }
   }

   /// Queries the bond state of `device_id`.
   pub async fn bond_state(&self, device_id: &str) -> Result<BondState> {
      let address = parse_device_id(device_id)?;
      let state = self.radio.bond_state(address).await?;
      debug!("Bond state for {address}: {state}");
      Ok(state)
   }

   /// Requests pairing with `device_id`. Returns whether the request was
   /// accepted for processing; the pairing outcome itself arrives later
   /// through channels outside this service.
   pub async fn create_bond(&self, device_id: &str) -> Result<bool> {
      let address = parse_device_id(device_id)?;
      let accepted = self.radio.create_bond(address).await?;
      info!("Bond request for {address}: accepted={accepted}");
      Ok(accepted)
   }
}

fn parse_device_id(device_id: &str) -> Result<Address> {
   let device_id = device_id.trim();
   if device_id.is_empty() {
      return Err(PeripheralError::MissingArgument("deviceId"));
   }
   Address::from_str(device_id)
      .map_err(|_| PeripheralError::InvalidDeviceId(device_id.to_string()))
}
