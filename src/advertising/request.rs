//! Advertising request and settings types.
//!
//! Surface clients hand us a loosely-typed argument bundle. This module
//! parses it into a strongly-typed [`AdvertisingRequest`] at the boundary,
//! with explicit errors for wrong types, instead of trusting the shape at
//! each internal call site.

use std::{collections::HashMap, time::Duration};

use uuid::Uuid;
use zbus::zvariant::Value;

use crate::error::{PeripheralError, Result};

/// Transmit power levels, in the order of their wire values 0..3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::FromRepr, strum::Display)]
#[repr(u8)]
pub enum TxPowerLevel {
   UltraLow = 0,
   Low = 1,
   #[default]
   Medium = 2,
   High = 3,
}

impl TxPowerLevel {
   /// Nominal transmit power in dBm.
   pub const fn dbm(self) -> i16 {
      match self {
         Self::UltraLow => -21,
         Self::Low => -15,
         Self::Medium => -7,
         Self::High => 1,
      }
   }
}

/// One advertising intent, immutable for the duration of a start call.
#[derive(Debug, Clone)]
pub struct AdvertisingRequest {
   pub local_name: Option<String>,
   pub service_uuid: Option<Uuid>,
   pub connectable: bool,
   pub include_device_name: bool,
   pub tx_power: TxPowerLevel,
   pub manufacturer_id: Option<u16>,
   pub manufacturer_data: Option<Vec<u8>>,
}

impl Default for AdvertisingRequest {
   fn default() -> Self {
      Self {
         local_name: None,
         service_uuid: None,
         connectable: true,
         include_device_name: true,
         tx_power: TxPowerLevel::default(),
         manufacturer_id: None,
         manufacturer_data: None,
      }
   }
}

impl AdvertisingRequest {
   /// Parses a loose argument bundle into a typed request.
   pub fn from_args(args: &HashMap<String, Value<'_>>) -> Result<Self> {
      let mut request = Self {
         local_name: take_string(args, "localName")?,
         ..Self::default()
      };

      if let Some(uuid_str) = take_string(args, "serviceUuid")? {
         let uuid = Uuid::parse_str(&uuid_str).map_err(|e| {
            PeripheralError::InvalidArguments(format!("serviceUuid '{uuid_str}': {e}"))
         })?;
         request.service_uuid = Some(uuid);
      }

      if let Some(connectable) = take_bool(args, "connectable")? {
         request.connectable = connectable;
      }
      if let Some(include) = take_bool(args, "includeDeviceName")? {
         request.include_device_name = include;
      }

      if let Some(tx) = take_integer(args, "txPower")? {
         // Out-of-range values clamp to High, matching the wire contract.
         request.tx_power =
            u8::try_from(tx).ok().and_then(TxPowerLevel::from_repr).unwrap_or(TxPowerLevel::High);
      }

      if let Some(id) = take_integer(args, "manufacturerId")? {
         let id = u16::try_from(id).map_err(|_| {
            PeripheralError::InvalidArguments(format!("manufacturerId {id} is not a u16"))
         })?;
         request.manufacturer_id = Some(id);
      }
      request.manufacturer_data = take_bytes(args, "manufacturerData")?;

      Ok(request)
   }

   /// Manufacturer payload, present only when both the id and a non-empty
   /// byte sequence were supplied. Inconsistent halves are dropped silently.
   pub fn manufacturer(&self) -> Option<(u16, &[u8])> {
      let id = self.manufacturer_id?;
      match self.manufacturer_data.as_deref() {
         Some(data) if !data.is_empty() => Some((id, data)),
         _ => None,
      }
   }
}

/// Settings derived once per start call; advertise mode is fixed to lowest
/// latency.
#[derive(Debug, Clone, Copy)]
pub struct AdvertisingSettings {
   pub connectable: bool,
   pub tx_power: TxPowerLevel,
}

/// Advertising interval of the fixed lowest-latency mode.
pub const ADVERTISE_INTERVAL: Duration = Duration::from_millis(100);

impl AdvertisingSettings {
   pub const fn from_request(request: &AdvertisingRequest) -> Self {
      Self {
         connectable: request.connectable,
         tx_power: request.tx_power,
      }
   }
}

fn unwrap_variant<'a>(value: &'a Value<'a>) -> &'a Value<'a> {
   // Clients may double-wrap values as variants
   match value {
      Value::Value(inner) => &**inner,
      other => other,
   }
}

fn take_string(args: &HashMap<String, Value<'_>>, key: &'static str) -> Result<Option<String>> {
   match args.get(key).map(unwrap_variant) {
      None => Ok(None),
      Some(Value::Str(s)) => Ok(Some(s.to_string())),
      Some(other) => Err(PeripheralError::InvalidArguments(format!(
         "'{key}' must be a string, got {}",
         other.value_signature()
      ))),
   }
}

fn take_bool(args: &HashMap<String, Value<'_>>, key: &'static str) -> Result<Option<bool>> {
   match args.get(key).map(unwrap_variant) {
      None => Ok(None),
      Some(Value::Bool(b)) => Ok(Some(*b)),
      Some(other) => Err(PeripheralError::InvalidArguments(format!(
         "'{key}' must be a boolean, got {}",
         other.value_signature()
      ))),
   }
}

fn value_as_i64(value: &Value<'_>) -> Option<i64> {
   match value {
      Value::U8(x) => Some(i64::from(*x)),
      Value::I16(x) => Some(i64::from(*x)),
      Value::U16(x) => Some(i64::from(*x)),
      Value::I32(x) => Some(i64::from(*x)),
      Value::U32(x) => Some(i64::from(*x)),
      Value::I64(x) => Some(*x),
      Value::U64(x) => i64::try_from(*x).ok(),
      Value::Value(inner) => value_as_i64(inner),
      _ => None,
   }
}

fn take_integer(args: &HashMap<String, Value<'_>>, key: &'static str) -> Result<Option<i64>> {
   match args.get(key) {
      None => Ok(None),
      Some(value) => value_as_i64(value).map(Some).ok_or_else(|| {
         PeripheralError::InvalidArguments(format!(
            "'{key}' must be an integer, got {}",
            value.value_signature()
         ))
      }),
   }
}

fn take_bytes(args: &HashMap<String, Value<'_>>, key: &'static str) -> Result<Option<Vec<u8>>> {
   let Some(value) = args.get(key).map(unwrap_variant) else {
      return Ok(None);
   };
   let Value::Array(array) = value else {
      return Err(PeripheralError::InvalidArguments(format!(
         "'{key}' must be a byte array, got {}",
         value.value_signature()
      )));
   };

   // Accept both `ay` and arrays of wider integers, truncated like the
   // original surface did.
   let mut bytes = Vec::with_capacity(array.len());
   for element in array.iter() {
      let Some(v) = value_as_i64(element) else {
         return Err(PeripheralError::InvalidArguments(format!(
            "'{key}' must contain only integers"
         )));
      };
      bytes.push(v as u8);
   }
   Ok(Some(bytes))
}
