//! D-Bus surfaces of the peripheral service.
//!
//! Two interfaces on one object: advertising control and bonding. Every
//! operation replies with exactly one success value or one structured
//! error; unknown member names are rejected by the bus itself.

use std::{collections::HashMap, sync::Arc};

use log::{info, warn};
use zbus::{interface, object_server::SignalEmitter, zvariant::Value};

use crate::{
   advertising::{request::AdvertisingRequest, session::AdvertisingSession},
   bonding::BondController,
   error::{PeripheralError, Result},
};

pub struct AdvertisingService {
   session: Arc<AdvertisingSession>,
}

impl AdvertisingService {
   pub const fn new(session: Arc<AdvertisingSession>) -> Self {
      Self { session }
   }
}

#[interface(name = "org.peripherald.Advertising")]
impl AdvertisingService {
   async fn is_advertising_supported(&self) -> bool {
      self.session.is_supported().await
   }

   async fn start(
      &self,
      args: HashMap<String, Value<'_>>,
      #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
   ) -> zbus::fdo::Result<bool> {
      let request = AdvertisingRequest::from_args(&args)?;
      self.session.start(&request).await?;

      info!(
         "Advertising as {:?}",
         request.local_name.as_deref().unwrap_or("<adapter name>")
      );
      if let Err(e) = Self::advertising_started(&emitter).await {
         warn!("Failed to emit AdvertisingStarted: {e}");
      }
      Ok(true)
   }

   async fn stop(
      &self,
      #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
   ) -> zbus::fdo::Result<bool> {
      self.session.stop()?;
      if let Err(e) = Self::advertising_stopped(&emitter).await {
         warn!("Failed to emit AdvertisingStopped: {e}");
      }
      Ok(true)
   }

   // Signals
   #[zbus(signal)]
   pub async fn advertising_started(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn advertising_stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

   // Session state for polling-free clients
   #[zbus(property)]
   async fn state(&self) -> String {
      self.session.state().to_string()
   }
}

pub struct BondingService {
   bonds: BondController,
}

impl BondingService {
   pub const fn new(bonds: BondController) -> Self {
      Self { bonds }
   }
}

#[interface(name = "org.peripherald.Bonding")]
impl BondingService {
   async fn get_bond_state(
      &self,
      args: HashMap<String, Value<'_>>,
   ) -> zbus::fdo::Result<u32> {
      let device_id = device_id_arg(&args)?;
      let state = self.bonds.bond_state(&device_id).await?;
      Ok(state as u32)
   }

   async fn create_bond(&self, args: HashMap<String, Value<'_>>) -> zbus::fdo::Result<bool> {
      let device_id = device_id_arg(&args)?;
      Ok(self.bonds.create_bond(&device_id).await?)
   }
}

fn device_id_arg(args: &HashMap<String, Value<'_>>) -> Result<String> {
   let value = args
      .get("deviceId")
      .ok_or(PeripheralError::MissingArgument("deviceId"))?;
   let value = match value {
      Value::Value(inner) => &**inner,
      other => other,
   };
   match value {
      Value::Str(s) => Ok(s.to_string()),
      other => Err(PeripheralError::InvalidArguments(format!(
         "'deviceId' must be a string, got {}",
         other.value_signature()
      ))),
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_device_id_arg_missing() {
      let err = device_id_arg(&HashMap::new()).unwrap_err();
      assert!(matches!(err, PeripheralError::MissingArgument("deviceId")));
   }

   #[test]
   fn test_device_id_arg_wrong_type() {
      let args = HashMap::from([("deviceId".to_string(), Value::from(1u32))]);
      let err = device_id_arg(&args).unwrap_err();
      assert!(matches!(err, PeripheralError::InvalidArguments(_)));
   }

   #[test]
   fn test_device_id_arg_unwraps_variant() {
      let args = HashMap::from([(
         "deviceId".to_string(),
         Value::Value(Box::new(Value::from("00:11:22:33:44:55"))),
      )]);
      assert_eq!(device_id_arg(&args).unwrap(), "00:11:22:33:44:55");
   }
}
