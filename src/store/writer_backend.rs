use async_trait::async_trait;
use thiserror::Error;

/// One row of weather data as it lands in storage
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// Reading time exactly as the receiver reported it
    pub date_time: String,
    /// Alias if one is configured, otherwise `model/id/channel`
    pub sensor_id: String,
    pub temp1: Option<f64>,
    pub temp2: Option<f64>,
    pub rh: Option<f64>,
    pub press: Option<f64>,
    pub light: Option<f64>,
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[async_trait]
pub trait RecordWriter: Send {
    /// Append a single record; it is durable once this returns
    async fn append(&mut self, record: &SensorRecord) -> Result<(), WriterError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
