//! GAP advertising data encoding.
//!
//! Maps one [`AdvertisingRequest`] into the two size-constrained payload
//! buckets of a legacy advertisement: the primary packet and the scan
//! response. The split is deliberate: manufacturer payloads are the largest
//! and most variable field, so they live in the scan response, keeping the
//! name and service UUID reliably visible to passive scanners.

use smallvec::SmallVec;
use uuid::Uuid;

use crate::{
   advertising::request::AdvertisingRequest,
   error::{PeripheralError, Result},
};

/// Payload limit of a legacy advertising packet.
pub const ADV_DATA_LEN_MAX: usize = 31;

// Advertising data types.
const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x07;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;

// Flags field bits.
const FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// One size-constrained bucket of encoded AD structures.
#[derive(Debug, Clone)]
pub struct Payload {
   bucket: &'static str,
   bytes: SmallVec<[u8; ADV_DATA_LEN_MAX]>,
}

impl Payload {
   fn new(bucket: &'static str) -> Self {
      Self {
         bucket,
         bytes: SmallVec::new(),
      }
   }

   /// Appends one `(length, type, payload)` AD structure.
   ///
   /// Exceeding the packet limit is a construction-time failure, never a
   /// silent truncation.
   fn append(&mut self, ad_type: u8, payload: &[u8]) -> Result<()> {
      let size = self.bytes.len() + 2 + payload.len();
      if size > ADV_DATA_LEN_MAX {
         return Err(PeripheralError::PayloadTooLarge {
            bucket: self.bucket,
            size,
            limit: ADV_DATA_LEN_MAX,
         });
      }
      self.bytes.push(payload.len() as u8 + 1);
      self.bytes.push(ad_type);
      self.bytes.extend_from_slice(payload);
      Ok(())
   }

   pub fn bytes(&self) -> &[u8] {
      &self.bytes
   }

   pub fn len(&self) -> usize {
      self.bytes.len()
   }

   pub fn is_empty(&self) -> bool {
      self.bytes.is_empty()
   }
}

/// The encoded advertisement, split into its two buckets, alongside the
/// typed fields a structured platform backend consumes.
#[derive(Debug, Clone)]
pub struct AdvertisingBuckets {
   pub primary: Payload,
   pub scan_response: Payload,

   local_name: Option<String>,
   include_device_name: bool,
   service_uuid: Option<Uuid>,
   manufacturer: Option<(u16, Vec<u8>)>,
}

impl AdvertisingBuckets {
   pub fn local_name(&self) -> Option<&str> {
      self.local_name.as_deref()
   }

   pub const fn include_device_name(&self) -> bool {
      self.include_device_name
   }

   pub const fn service_uuid(&self) -> Option<Uuid> {
      self.service_uuid
   }

   pub fn manufacturer(&self) -> Option<(u16, &[u8])> {
      self.manufacturer.as_ref().map(|(id, data)| (*id, data.as_slice()))
   }
}

/// Encodes a request into its advertising buckets. Pure transformation.
///
/// The primary bucket carries the flags, the device name and the service
/// UUID; the scan response carries only the manufacturer payload. Nothing
/// else goes into the primary packet, keeping the discoverable packet
/// minimal.
pub fn encode(request: &AdvertisingRequest) -> Result<AdvertisingBuckets> {
   let mut primary = Payload::new("primary");
   primary.append(AD_FLAGS, &[FLAG_LE_GENERAL_DISCOVERABLE | FLAG_BR_EDR_NOT_SUPPORTED])?;

   if request.include_device_name
      && let Some(name) = request.local_name.as_deref()
      && !name.is_empty()
   {
      primary.append(AD_COMPLETE_LOCAL_NAME, name.as_bytes())?;
   }

   if let Some(uuid) = request.service_uuid {
      // AD structures carry UUIDs little-endian
      let mut uuid_bytes = *uuid.as_bytes();
      uuid_bytes.reverse();
      primary.append(AD_COMPLETE_LIST_128_BIT_SERVICE_UUIDS, &uuid_bytes)?;
   }

   let mut scan_response = Payload::new("scan response");
   let manufacturer = request.manufacturer().map(|(id, data)| (id, data.to_vec()));
   if let Some((id, data)) = &manufacturer {
      let field = [&id.to_le_bytes()[..], data].concat();
      scan_response.append(AD_MANUFACTURER_SPECIFIC_DATA, &field)?;
   }

   Ok(AdvertisingBuckets {
      primary,
      scan_response,
      local_name: request.local_name.clone(),
      include_device_name: request.include_device_name,
      service_uuid: request.service_uuid,
      manufacturer,
   })
}
