//! WDL_433: weather data logger for rtl_433
//!
//! Subscribes to the JSON readings an rtl_433 receiver publishes over MQTT,
//! drops retransmissions and over-frequent readings per sensor, renames
//! sensors through an alias table, and appends what is left to SQLite.

pub mod ingest;
pub mod logging;
pub mod params;
pub mod sensor;
pub mod store;
