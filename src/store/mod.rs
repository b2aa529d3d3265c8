pub mod sqlite_writer;
pub mod writer_backend;

pub use sqlite_writer::SqliteWriter;
pub use writer_backend::{RecordWriter, SensorRecord, WriterError};
