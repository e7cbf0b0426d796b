//! Scripted radio used by the session and bonding tests.

use std::{
   collections::{HashMap, VecDeque},
   sync::Arc,
};

use async_trait::async_trait;
use bluer::Address;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
   advertising::{data::AdvertisingBuckets, request::AdvertisingSettings},
   bonding::BondState,
   error::Result,
   radio::{AdvertiseToken, Capabilities, PermissionState, Radio, StartOutcome, Submission},
};

/// How the mock answers the next `submit` call. Unscripted calls complete
/// immediately with success.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedStart {
   Complete(StartOutcome),
   /// Never deliver the completion; exercises the start timeout.
   Pending,
}

/// One recorded submission.
pub struct SubmittedAdvertisement {
   pub settings: AdvertisingSettings,
   pub primary: Vec<u8>,
   pub scan_response: Vec<u8>,
}

#[derive(Default)]
pub struct MockRadio {
   pub capabilities: Mutex<Capabilities>,
   pub permission: Mutex<PermissionState>,
   pub submissions: Mutex<Vec<SubmittedAdvertisement>>,
   pub cancelled: Mutex<Vec<AdvertiseToken>>,
   pub bond_states: Mutex<HashMap<Address, BondState>>,
   pub bond_accepts: Mutex<bool>,
   script: Mutex<VecDeque<ScriptedStart>>,
   // Keeps pending completions alive so the receiver never errors
   held_completions: Mutex<Vec<oneshot::Sender<StartOutcome>>>,
}

impl MockRadio {
   /// A fully capable, permitted radio.
   pub fn new() -> Arc<Self> {
      Arc::new(Self {
         capabilities: Mutex::new(Capabilities {
            api_available: true,
            adapter_powered: true,
            advertiser_present: true,
            multi_advertisement: true,
         }),
         bond_accepts: Mutex::new(true),
         ..Self::default()
      })
   }

   pub fn script_start(&self, outcome: ScriptedStart) {
      self.script.lock().push_back(outcome);
   }

   pub fn set_bond_state(&self, address: Address, state: BondState) {
      self.bond_states.lock().insert(address, state);
   }
}

#[async_trait]
impl Radio for MockRadio {
   async fn capabilities(&self) -> Capabilities {
      *self.capabilities.lock()
   }

   fn advertise_permission(&self) -> PermissionState {
      *self.permission.lock()
   }

   async fn submit(
      &self,
      settings: &AdvertisingSettings,
      buckets: &AdvertisingBuckets,
   ) -> Result<Submission> {
      self.submissions.lock().push(SubmittedAdvertisement {
         settings: *settings,
         primary: buckets.primary.bytes().to_vec(),
         scan_response: buckets.scan_response.bytes().to_vec(),
      });

      let token = AdvertiseToken::fresh();
      let (tx, rx) = oneshot::channel();
      let scripted = self
         .script
         .lock()
         .pop_front()
         .unwrap_or(ScriptedStart::Complete(StartOutcome::Started));
      match scripted {
         ScriptedStart::Complete(outcome) => {
            let _ = tx.send(outcome);
         },
         ScriptedStart::Pending => {
            self.held_completions.lock().push(tx);
         },
      }
      Ok(Submission {
         token,
         completion: rx,
      })
   }

   fn cancel(&self, token: AdvertiseToken) -> Result<()> {
      self.cancelled.lock().push(token);
      Ok(())
   }

   async fn bond_state(&self, address: Address) -> Result<BondState> {
      Ok(self
         .bond_states
         .lock()
         .get(&address)
         .copied()
         .unwrap_or(BondState::Unbonded))
   }

   async fn create_bond(&self, _address: Address) -> Result<bool> {
      Ok(*self.bond_accepts.lock())
   }
}
