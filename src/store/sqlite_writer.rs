use crate::store::writer_backend::{RecordWriter, SensorRecord, WriterError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub const TABLE_NAME: &str = "SensorData";

pub struct SqliteWriter {
    conn: Connection,
    path: PathBuf,
}

impl SqliteWriter {
    /// Open or create the database and its `SensorData` table
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let db_path = db_path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                WriterError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create database directory {}: {}", parent.display(), e),
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;
        apply_pragmas(&conn)?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    date_time TEXT,
                    sensorID TEXT,
                    temp1 REAL,
                    temp2 REAL,
                    rh REAL,
                    press REAL,
                    light REAL
                )",
                TABLE_NAME
            ),
            [],
        )?;

        log::info!("✅ SQLite database ready at {} (WAL mode)", db_path.display());

        Ok(Self {
            conn,
            path: db_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// WAL journal with NORMAL sync
fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    log::debug!("SQLite journal_mode = {}", mode);
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

#[async_trait]
impl RecordWriter for SqliteWriter {
    async fn append(&mut self, record: &SensorRecord) -> Result<(), WriterError> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (date_time, sensorID, temp1, temp2, rh, press, light)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                TABLE_NAME
            ),
            params![
                record.date_time,
                record.sensor_id,
                record.temp1,
                record.temp2,
                record.rh,
                record.press,
                record.light,
            ],
        )?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_record(sensor_id: &str) -> SensorRecord {
        SensorRecord {
            date_time: "2025-04-15 12:00:00".to_string(),
            sensor_id: sensor_id.to_string(),
            temp1: Some(21.5),
            temp2: None,
            rh: Some(48.0),
            press: None,
            light: None,
        }
    }

    #[tokio::test]
    async fn test_sqlite_basic_append() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("Weather.db");
        let mut writer = SqliteWriter::new(&db_path).unwrap();

        writer.append(&create_test_record("Garage")).await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let (sensor, temp1, temp2): (String, Option<f64>, Option<f64>) = conn
            .query_row(
                "SELECT sensorID, temp1, temp2 FROM SensorData WHERE date_time = ?1",
                params!["2025-04-15 12:00:00"],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();

        assert_eq!(sensor, "Garage");
        assert_eq!(temp1, Some(21.5));
        assert_eq!(temp2, None);
    }

    #[tokio::test]
    async fn test_every_append_is_kept() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("Weather.db");
        let mut writer = SqliteWriter::new(&db_path).unwrap();

        for i in 0..25 {
            writer.append(&create_test_record(&format!("sensor/{}/", i))).await.unwrap();
        }
        // Identical rows are not collapsed
        writer.append(&create_test_record("sensor/0/")).await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM SensorData", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 26);
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("databases").join("nested").join("Weather.db");

        let writer = SqliteWriter::new(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(writer.path(), db_path.as_path());
        assert_eq!(writer.backend_type(), "SQLite");
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("Weather.db");
        {
            let mut writer = SqliteWriter::new(&db_path).unwrap();
            writer.append(&create_test_record("Garage")).await.unwrap();
        }

        let mut writer = SqliteWriter::new(&db_path).unwrap();
        writer.append(&create_test_record("Shed")).await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM SensorData", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_wal_mode_configured() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("Weather.db");
        let _writer = SqliteWriter::new(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_unopenable_path_is_an_error() {
        let dir = tempdir().unwrap();
        // A directory where the database file should be
        let db_path = dir.path().join("Weather.db");
        std::fs::create_dir(&db_path).unwrap();

        assert!(SqliteWriter::new(&db_path).is_err());
    }
}
