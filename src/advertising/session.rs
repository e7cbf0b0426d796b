//! Advertising session lifecycle.
//!
//! The session owns at most one active advertising operation at a time and
//! bridges the radio's asynchronous start callback into a single completion.
//! Callers are expected to serialize `start`/`stop`; the transition guard
//! below is what rejects a concurrent start, because a second submission to
//! the radio while one is pending is undefined hardware behavior.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::time;

use crate::{
   advertising::{
      data,
      request::{AdvertisingRequest, AdvertisingSettings},
   },
   error::{PeripheralError, Result},
   radio::{AdvertiseToken, Radio, StartOutcome},
};

/// Session states. Failure during `Starting` falls back to `Idle` without
/// ever reaching `Advertising`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
   #[default]
   Idle,
   Starting,
   Advertising,
   Stopping,
}

#[derive(Default)]
struct Inner {
   state: SessionState,
   token: Option<AdvertiseToken>,
}

/// The advertising session state machine.
pub struct AdvertisingSession {
   radio: Arc<dyn Radio>,
   start_timeout: Duration,
   inner: Mutex<Inner>,
}

impl AdvertisingSession {
   pub fn new(radio: Arc<dyn Radio>, start_timeout: Duration) -> Self {
      Self {
         radio,
         start_timeout,
         inner: Mutex::new(Inner::default()),
      }
   }

   pub fn state(&self) -> SessionState {
      self.inner.lock().state
   }

   /// True iff advertising is possible at all. Never fails.
   pub async fn is_supported(&self) -> bool {
      self.radio.capabilities().await.advertising_supported()
   }

   /// Starts advertising and returns once the radio confirms or refuses.
   ///
   /// Preconditions are checked in order, each a distinct fast-fail that
   /// leaves the state `Idle`.
   pub async fn start(&self, request: &AdvertisingRequest) -> Result<()> {
      let caps = self.radio.capabilities().await;
      if !caps.api_available {
         return Err(PeripheralError::UnsupportedApi);
      }
      if !self.radio.advertise_permission().granted() {
         return Err(PeripheralError::PermissionDenied);
      }
      if !caps.advertiser_present {
         return Err(PeripheralError::NoAdvertiser);
      }

      {
         let mut inner = self.inner.lock();
         if inner.state != SessionState::Idle {
            return Err(PeripheralError::ConcurrentStart);
         }
         inner.state = SessionState::Starting;
      }

      let settings = AdvertisingSettings::from_request(request);
      let buckets = match data::encode(request) {
         Ok(buckets) => buckets,
         Err(e) => return self.fail_start(e),
      };
      debug!(
         "Encoded primary ({} bytes): {}",
         buckets.primary.len(),
         hex::encode(buckets.primary.bytes())
      );
      debug!(
         "Encoded scan response ({} bytes): {}",
         buckets.scan_response.len(),
         hex::encode(buckets.scan_response.bytes())
      );

      let submission = match self.radio.submit(&settings, &buckets).await {
         Ok(submission) => submission,
         Err(e) => return self.fail_start(e),
      };
      let token = submission.token;
      {
         let mut inner = self.inner.lock();
         if inner.state != SessionState::Starting {
            // Stopped out from under us before the token was stored
            drop(inner);
            let _ = self.radio.cancel(token);
            return Ok(());
         }
         inner.token = Some(token);
      }

      // Exactly one completion is expected; suspend until it arrives.
      match time::timeout(self.start_timeout, submission.completion).await {
         Err(_) => self.fail_start(PeripheralError::RequestTimeout),
         Ok(Err(_)) => self.fail_start(PeripheralError::CompletionLost),
         Ok(Ok(StartOutcome::Failed(code))) => {
            self.fail_start(PeripheralError::HardwareStart(code))
         },
         Ok(Ok(StartOutcome::Started)) => {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Starting && inner.token == Some(token) {
               inner.state = SessionState::Advertising;
               info!("Advertising started");
            }
            // A stop that raced the completion already released the token
            Ok(())
         },
      }
   }

   /// Stops advertising. Idempotent: from `Idle` this reports success
   /// without contacting the radio.
   pub fn stop(&self) -> Result<()> {
      let token = {
         let mut inner = self.inner.lock();
         if inner.state == SessionState::Idle {
            return Ok(());
         }
         inner.state = SessionState::Stopping;
         inner.token.take()
      };

      let result = match token {
         Some(token) => self.radio.cancel(token),
         None => Ok(()),
      };

      // The token is consumed either way; the cycle is over
      self.inner.lock().state = SessionState::Idle;

      match result {
         Ok(()) => {
            info!("Advertising stopped");
            Ok(())
         },
         Err(e @ PeripheralError::HardwareStop(_)) => Err(e),
         Err(e) => Err(PeripheralError::HardwareStop(e.to_string())),
      }
   }

   /// Teardown cleanup: a non-idle session must not leak the radio resource.
   pub fn shutdown(&self) {
      if self.state() != SessionState::Idle {
         if let Err(e) = self.stop() {
            warn!("Failed to stop advertising during shutdown: {e}");
         }
      }
   }

   fn fail_start(&self, err: PeripheralError) -> Result<()> {
      let token = {
         let mut inner = self.inner.lock();
         inner.state = SessionState::Idle;
         inner.token.take()
      };
      if let Some(token) = token {
         // Release whatever the radio may still hold for this cycle
         let _ = self.radio.cancel(token);
      }
      warn!("Advertising start failed: {err}");
      Err(err)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::radio::{
      PermissionState,
      mock::{MockRadio, ScriptedStart},
   };

   const START_TIMEOUT: Duration = Duration::from_secs(5);

   fn session(radio: &Arc<MockRadio>) -> AdvertisingSession {
      AdvertisingSession::new(radio.clone() as Arc<dyn Radio>, START_TIMEOUT)
   }

   fn tag_request() -> AdvertisingRequest {
      AdvertisingRequest {
         local_name: Some("Tag1".to_string()),
         manufacturer_id: Some(0x01),
         manufacturer_data: Some(vec![0xAA, 0xBB]),
         ..AdvertisingRequest::default()
      }
   }

   #[tokio::test]
   async fn test_start_reports_success_and_advertises() {
      let radio = MockRadio::new();
      let session = session(&radio);

      session.start(&tag_request()).await.unwrap();
      assert_eq!(session.state(), SessionState::Advertising);

      let submissions = radio.submissions.lock();
      assert_eq!(submissions.len(), 1);
      assert!(submissions[0].settings.connectable);
      // Name in the primary, manufacturer payload in the scan response
      assert!(!submissions[0].primary.is_empty());
      assert_eq!(
         submissions[0].scan_response,
         vec![0x05, 0xFF, 0x01, 0x00, 0xAA, 0xBB]
      );
   }

   #[tokio::test]
   async fn test_concurrent_start_is_rejected() {
      let radio = MockRadio::new();
      let session = session(&radio);

      session.start(&tag_request()).await.unwrap();
      assert_eq!(session.state(), SessionState::Advertising);

      let err = session.start(&AdvertisingRequest::default()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::ConcurrentStart));
      // The active session is untouched
      assert_eq!(session.state(), SessionState::Advertising);
      assert_eq!(radio.submissions.lock().len(), 1);
   }

   #[tokio::test]
   async fn test_stop_is_idempotent_from_idle() {
      let radio = MockRadio::new();
      let session = session(&radio);

      session.stop().unwrap();
      assert_eq!(session.state(), SessionState::Idle);
      session.stop().unwrap();
      assert_eq!(session.state(), SessionState::Idle);
      assert!(radio.cancelled.lock().is_empty());
   }

   #[tokio::test]
   async fn test_stop_releases_the_token() {
      let radio = MockRadio::new();
      let session = session(&radio);

      session.start(&tag_request()).await.unwrap();
      session.stop().unwrap();

      assert_eq!(session.state(), SessionState::Idle);
      assert_eq!(radio.cancelled.lock().len(), 1);

      // A new cycle may begin
      session.start(&tag_request()).await.unwrap();
      assert_eq!(session.state(), SessionState::Advertising);
   }

   #[tokio::test]
   async fn test_permission_denied_keeps_state_idle() {
      let radio = MockRadio::new();
      *radio.permission.lock() = PermissionState::Denied;
      let session = session(&radio);

      let err = session.start(&AdvertisingRequest::default()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::PermissionDenied));
      assert_eq!(session.state(), SessionState::Idle);
      assert!(radio.submissions.lock().is_empty());
   }

   #[tokio::test]
   async fn test_unsupported_api_fast_fail() {
      let radio = MockRadio::new();
      radio.capabilities.lock().api_available = false;
      let session = session(&radio);

      let err = session.start(&AdvertisingRequest::default()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::UnsupportedApi));
      assert_eq!(session.state(), SessionState::Idle);
   }

   #[tokio::test]
   async fn test_missing_advertiser_fast_fail() {
      let radio = MockRadio::new();
      radio.capabilities.lock().advertiser_present = false;
      let session = session(&radio);

      let err = session.start(&AdvertisingRequest::default()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::NoAdvertiser));
      assert_eq!(session.state(), SessionState::Idle);
   }

   #[tokio::test]
   async fn test_hardware_failure_code_is_passed_through() {
      let radio = MockRadio::new();
      radio.script_start(ScriptedStart::Complete(StartOutcome::Failed(2)));
      let session = session(&radio);

      let err = session.start(&tag_request()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::HardwareStart(2)));
      assert_eq!(session.state(), SessionState::Idle);
   }

   #[tokio::test]
   async fn test_encoding_failure_falls_back_to_idle() {
      let radio = MockRadio::new();
      let session = session(&radio);

      let request = AdvertisingRequest {
         manufacturer_id: Some(0x01),
         manufacturer_data: Some(vec![0u8; 28]),
         ..AdvertisingRequest::default()
      };
      let err = session.start(&request).await.unwrap_err();
      assert!(matches!(err, PeripheralError::PayloadTooLarge { .. }));
      assert_eq!(session.state(), SessionState::Idle);
      assert!(radio.submissions.lock().is_empty());
   }

   #[tokio::test]
   async fn test_silent_radio_times_out() {
      let radio = MockRadio::new();
      radio.script_start(ScriptedStart::Pending);
      let session =
         AdvertisingSession::new(radio.clone() as Arc<dyn Radio>, Duration::from_millis(20));

      let err = session.start(&tag_request()).await.unwrap_err();
      assert!(matches!(err, PeripheralError::RequestTimeout));
      assert_eq!(session.state(), SessionState::Idle);
      // The stale token was released
      assert_eq!(radio.cancelled.lock().len(), 1);
   }

   #[tokio::test]
   async fn test_capability_gate_requires_multi_advertisement() {
      let radio = MockRadio::new();
      radio.capabilities.lock().multi_advertisement = false;
      let session = session(&radio);
      assert!(!session.is_supported().await);
   }

   #[tokio::test]
   async fn test_shutdown_stops_a_live_advertisement() {
      let radio = MockRadio::new();
      let session = session(&radio);

      session.start(&tag_request()).await.unwrap();
      session.shutdown();
      assert_eq!(session.state(), SessionState::Idle);
      assert_eq!(radio.cancelled.lock().len(), 1);
   }
}
