//! Message intake: MQTT subscription, payload decoding, and the hand-off
//! from decoded reading to deduplication and storage.

pub mod backoff;
pub mod mqtt_client;
pub mod processor;
pub mod reading;

pub use mqtt_client::{run_with_reconnect, BrokerConfig, ClientError};
pub use processor::{Outcome, ProcessorStats, ReadingProcessor};
pub use reading::{DecodeError, SensorReading, SkipReason};
