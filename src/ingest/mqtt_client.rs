use crate::ingest::backoff::{ExponentialBackoff, MaxRetriesExceeded};
use crate::ingest::processor::ReadingProcessor;
use crate::params::settings::{Settings, APP_NAME};
use crate::store::WriterError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub const KEEP_ALIVE_SECS: u64 = 60;
const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Maximum retry attempts exceeded")]
    MaxRetries(#[from] MaxRetriesExceeded),
    #[error("Storage error: {0}")]
    Writer(#[from] WriterError),
}

/// Where to subscribe
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

impl BrokerConfig {
    /// Client id is unique per process so several loggers can share a broker
    pub fn client_id(&self) -> String {
        format!("{}_{}", APP_NAME, std::process::id())
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));
        options
    }
}

impl From<&Settings> for BrokerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            topic: settings.topic.clone(),
        }
    }
}

enum Step {
    Continue,
    Stop,
}

/// Subscribe to the broker and feed every message to `processor` until
/// `shutdown` resolves.
///
/// The subscription is renewed on every (re)connect. Connection failures
/// back off exponentially; a storage failure ends the loop.
pub async fn run_with_reconnect<S>(
    broker: &BrokerConfig,
    processor: &mut ReadingProcessor,
    shutdown: S,
) -> Result<(), ClientError>
where
    S: Future<Output = ()>,
{
    let (client, mut eventloop) = AsyncClient::new(broker.mqtt_options(), REQUEST_CAPACITY);
    let mut backoff = ExponentialBackoff::default();
    tokio::pin!(shutdown);

    log::info!(
        "🔗 Connecting to MQTT broker {}:{} as {}",
        broker.host,
        broker.port,
        broker.client_id()
    );

    let result = loop {
        let event = tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = eventloop.poll() => event,
        };

        match event {
            Ok(event) => match handle_event(&client, broker, &mut backoff, processor, event).await {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => break Ok(()),
                Err(e) => break Err(e),
            },
            Err(e) => {
                log::error!("❌ MQTT connection error: {}", e);
                tokio::select! {
                    _ = &mut shutdown => break Ok(()),
                    retry = backoff.sleep() => {
                        if let Err(e) = retry {
                            break Err(e.into());
                        }
                    }
                }
            }
        }
    };

    disconnect(&client, &mut eventloop).await;
    result
}

async fn handle_event(
    client: &AsyncClient,
    broker: &BrokerConfig,
    backoff: &mut ExponentialBackoff,
    processor: &mut ReadingProcessor,
    event: Event,
) -> Result<Step, ClientError> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            log::info!("✅ Connected to MQTT broker ({:?})", ack.code);
            backoff.reset();
            client
                .try_subscribe(broker.topic.clone(), QoS::AtMostOnce)
                .map_err(|e| ClientError::Connection(e.to_string()))?;
            log::info!("📡 Subscribed to '{}'", broker.topic);
        }
        Event::Incoming(Packet::Publish(publish)) => {
            processor.process(&publish.payload).await?;
        }
        Event::Incoming(Packet::Disconnect) => {
            log::warn!("Broker closed the session");
            return Ok(Step::Stop);
        }
        Event::Incoming(packet) => log::trace!("MQTT incoming {:?}", packet),
        Event::Outgoing(packet) => log::trace!("MQTT outgoing {:?}", packet),
    }
    Ok(Step::Continue)
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    // Give the event loop a chance to flush the DISCONNECT packet
    let _ = tokio::time::timeout(DISCONNECT_GRACE, eventloop.poll()).await;
    log::info!("🔌 Disconnected from MQTT broker");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{DedupEngine, SensorTree};
    use crate::store::{RecordWriter, SensorRecord};
    use async_trait::async_trait;
    use chrono::TimeDelta;

    struct NullWriter;

    #[async_trait]
    impl RecordWriter for NullWriter {
        async fn append(&mut self, _record: &SensorRecord) -> Result<(), WriterError> {
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "Null"
        }
    }

    fn broker() -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            topic: "rtl_433/+/events".to_string(),
        }
    }

    #[test]
    fn test_mqtt_options() {
        let broker = broker();
        let options = broker.mqtt_options();

        assert_eq!(options.client_id(), format!("WDL_433_{}", std::process::id()));
        assert_eq!(options.broker_address(), ("127.0.0.1".to_string(), 1));
        assert_eq!(options.keep_alive(), Duration::from_secs(KEEP_ALIVE_SECS));
    }

    #[tokio::test]
    async fn test_shutdown_before_connect() {
        let engine =
            DedupEngine::new(SensorTree::new(), TimeDelta::seconds(2), TimeDelta::seconds(300));
        let mut processor = ReadingProcessor::new(engine, Box::new(NullWriter));

        let result = run_with_reconnect(&broker(), &mut processor, std::future::ready(())).await;
        assert!(result.is_ok());
        assert_eq!(processor.stats().received, 0);
    }
}
