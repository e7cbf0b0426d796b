//! BLE peripheral D-Bus service.
//!
//! peripherald exposes the local adapter's peripheral role over D-Bus:
//! capability-gated BLE advertising with encoded GAP payloads, and bond
//! queries and pairing requests for remote devices.

use std::{sync::Arc, time::Duration};

use log::info;
use smol_str::SmolStr;
use tokio::signal;
use zbus::connection;

mod advertising;
mod bonding;
mod config;
mod dbus;
mod error;
mod radio;

use crate::{
   advertising::session::AdvertisingSession,
   bonding::BondController,
   dbus::{AdvertisingService, BondingService},
   error::Result,
   radio::{Radio, bluez::BluerRadio},
};

#[tokio::main]
async fn main() -> Result<()> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   info!("Starting peripherald D-Bus service...");

   let config = config::Config::load()?;

   let bt_session = bluer::Session::new().await?;
   let adapter_name = match &config.adapter {
      Some(name) => name.clone(),
      None => bt_session
         .adapter_names()
         .await?
         .into_iter()
         .next()
         .map_or(SmolStr::new_static("hci0"), SmolStr::from),
   };
   let adapter = bt_session.adapter(&adapter_name)?;
   info!("Using Bluetooth adapter {adapter_name}");

   let radio: Arc<dyn Radio> = Arc::new(BluerRadio::new(adapter));
   let session = Arc::new(AdvertisingSession::new(
      radio.clone(),
      Duration::from_secs(config.start_timeout_sec),
   ));

   let connection = connection::Builder::session()?
      .name("org.peripherald")?
      .serve_at(
         "/org/peripherald/manager",
         AdvertisingService::new(session.clone()),
      )?
      .serve_at(
         "/org/peripherald/manager",
         BondingService::new(BondController::new(radio)),
      )?
      .build()
      .await?;

   info!("peripherald D-Bus service started at org.peripherald");

   signal::ctrl_c().await?;
   info!("Shutting down peripherald service...");

   // A live advertisement must not outlive the service
   session.shutdown();
   drop(connection);

   Ok(())
}
