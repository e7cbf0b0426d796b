//! Advertising core.
//!
//! This module turns advertising intents into encoded GAP payloads and
//! drives the session lifecycle against the radio.

pub mod data;
pub mod request;
pub mod session;
