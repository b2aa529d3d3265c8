use crate::ingest::reading::{prefilter, SensorReading, SkipReason};
use crate::sensor::{Decision, DedupEngine};
use crate::store::{RecordWriter, WriterError};

/// What happened to one payload
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Skipped(SkipReason),
    Undecodable,
    Duplicate,
    RateLimited,
    /// Stored under this sensor id
    Recorded(String),
}

/// Running totals, logged on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub received: u64,
    pub skipped: u64,
    pub undecodable: u64,
    pub duplicates: u64,
    pub rate_limited: u64,
    pub recorded: u64,
}

/// Decode, filter and store incoming rtl_433 payloads
pub struct ReadingProcessor {
    engine: DedupEngine,
    writer: Box<dyn RecordWriter>,
    stats: ProcessorStats,
}

impl ReadingProcessor {
    pub fn new(engine: DedupEngine, writer: Box<dyn RecordWriter>) -> Self {
        Self {
            engine,
            writer,
            stats: ProcessorStats::default(),
        }
    }

    /// Handle one payload. Only a storage failure is an error; bad payloads
    /// are logged and dropped.
    pub async fn process(&mut self, payload: &[u8]) -> Result<Outcome, WriterError> {
        self.stats.received += 1;

        if let Some(reason) = prefilter(payload) {
            self.stats.skipped += 1;
            return Ok(Outcome::Skipped(reason));
        }

        let reading = match SensorReading::decode(payload) {
            Ok(reading) => reading,
            Err(e) => {
                log::warn!(
                    "⚠️  Ignoring payload: {} ({})",
                    e,
                    String::from_utf8_lossy(payload)
                );
                self.stats.undecodable += 1;
                return Ok(Outcome::Undecodable);
            }
        };

        let sensor_id = match self.engine.admit(&reading.key, reading.time) {
            Decision::SuppressDuplicate => {
                self.stats.duplicates += 1;
                return Ok(Outcome::Duplicate);
            }
            Decision::SuppressRateLimited => {
                self.stats.rate_limited += 1;
                return Ok(Outcome::RateLimited);
            }
            Decision::Record(sensor_id) => sensor_id,
        };

        let record = reading.to_record(sensor_id);
        self.writer.append(&record).await?;
        self.stats.recorded += 1;

        log::debug!(
            "✅ {}: {:>20} {} {} {} {} {}",
            record.date_time,
            record.sensor_id,
            measurement(record.temp1, "°C"),
            measurement(record.temp2, "°C"),
            measurement(record.rh, "% RH"),
            measurement(record.press, " hPa"),
            measurement(record.light, "% light"),
        );

        Ok(Outcome::Recorded(record.sensor_id))
    }

    pub fn engine(&self) -> &DedupEngine {
        &self.engine
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    pub fn backend_type(&self) -> &'static str {
        self.writer.backend_type()
    }
}

fn measurement(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorTree;
    use crate::store::SensorRecord;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryWriter {
        records: Arc<Mutex<Vec<SensorRecord>>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordWriter for MemoryWriter {
        async fn append(&mut self, record: &SensorRecord) -> Result<(), WriterError> {
            if self.fail {
                return Err(WriterError::Io(std::io::Error::other("disk full")));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "Memory"
        }
    }

    fn processor(tree: SensorTree, writer: MemoryWriter) -> ReadingProcessor {
        let engine = DedupEngine::new(tree, TimeDelta::seconds(2), TimeDelta::seconds(300));
        ReadingProcessor::new(engine, Box::new(writer))
    }

    fn payload(time: &str, model: &str, id: u32, temp: f64) -> Vec<u8> {
        format!(
            r#"{{"time":"{}","model":"{}","id":{},"channel":1,"temperature_C":{}}}"#,
            time, model, id, temp
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_recorded_under_alias() {
        let mut tree = SensorTree::new();
        tree.bootstrap_alias("Acurite/7/1", "Garage");
        let writer = MemoryWriter::default();
        let mut proc = processor(tree, writer.clone());

        let outcome = proc
            .process(&payload("2025-04-15 12:00:00", "Acurite", 7, 18.5))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Recorded("Garage".to_string()));

        let records = writer.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sensor_id, "Garage");
        assert_eq!(records[0].date_time, "2025-04-15 12:00:00");
        assert_eq!(records[0].temp1, Some(18.5));
    }

    #[tokio::test]
    async fn test_burst_and_interval() {
        let writer = MemoryWriter::default();
        let mut proc = processor(SensorTree::new(), writer.clone());

        let outcomes = vec![
            proc.process(&payload("2025-04-15 12:00:00", "X", 1, 20.0)).await.unwrap(),
            proc.process(&payload("2025-04-15 12:00:00", "X", 1, 20.0)).await.unwrap(),
            proc.process(&payload("2025-04-15 12:00:30", "X", 1, 20.1)).await.unwrap(),
            proc.process(&payload("2025-04-15 12:05:00", "X", 1, 20.2)).await.unwrap(),
        ];

        assert_eq!(
            outcomes,
            vec![
                Outcome::Recorded("X/1/1".to_string()),
                Outcome::Duplicate,
                Outcome::RateLimited,
                Outcome::Recorded("X/1/1".to_string()),
            ]
        );
        assert_eq!(writer.records.lock().unwrap().len(), 2);

        let stats = proc.stats();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rate_limited, 1);
    }

    #[tokio::test]
    async fn test_filtered_and_bad_payloads_are_not_errors() {
        let writer = MemoryWriter::default();
        let mut proc = processor(SensorTree::new(), writer.clone());

        let tpms =
            br#"{"time":"2025-04-15 12:00:00","model":"Schrader","type":"TPMS","temperature_C":25}"#;
        assert_eq!(
            proc.process(tpms).await.unwrap(),
            Outcome::Skipped(SkipReason::TyrePressure)
        );

        let remote = br#"{"time":"2025-04-15 12:00:00","model":"Doorbell","id":3}"#;
        assert_eq!(
            proc.process(remote).await.unwrap(),
            Outcome::Skipped(SkipReason::NoTemperature)
        );

        let broken = br#"{"time":"2025-04-15 12:00:00","temperature_C":"#;
        assert_eq!(proc.process(broken).await.unwrap(), Outcome::Undecodable);

        assert!(writer.records.lock().unwrap().is_empty());
        assert!(proc.engine().sensors().is_empty());
        assert_eq!(proc.stats().skipped, 2);
        assert_eq!(proc.stats().undecodable, 1);
    }

    #[tokio::test]
    async fn test_far_future_epoch_is_suppressed_not_fatal() {
        let writer = MemoryWriter::default();
        let mut proc = processor(SensorTree::new(), writer.clone());
        let late = payload("8210266876799", "X", 1, 20.0);

        assert_eq!(
            proc.process(&late).await.unwrap(),
            Outcome::Recorded("X/1/1".to_string())
        );
        assert_eq!(proc.process(&late).await.unwrap(), Outcome::Duplicate);
        assert_eq!(writer.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writer_failure_is_returned() {
        let writer = MemoryWriter {
            fail: true,
            ..Default::default()
        };
        let mut proc = processor(SensorTree::new(), writer);

        let result = proc.process(&payload("2025-04-15 12:00:00", "X", 1, 20.0)).await;
        assert!(matches!(result, Err(WriterError::Io(_))));
        assert_eq!(proc.backend_type(), "Memory");
    }
}
