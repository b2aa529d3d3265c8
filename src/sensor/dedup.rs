//! Duplicate and rate suppression for sensor readings
//!
//! rtl_433 repeats each radio transmission several times, and weather
//! sensors transmit far more often than anyone wants to store. Two windows
//! apply, at different granularities:
//!
//! - duplicate window: compared against the single most recently seen
//!   reading (any sensor). A repeat of the same key inside the window is a
//!   retransmission of the same burst.
//! - recording interval: compared against the last *stored* reading of the
//!   same sensor. Anything sooner is dropped to throttle steady-state volume.
//!
//! Readings that pass both are stored under the sensor's alias if it has one.

use crate::sensor::tree::{NodeId, SensorTree};
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Same key as the previous reading, inside the duplicate window
    SuppressDuplicate,
    /// This sensor was stored less than one recording interval ago
    SuppressRateLimited,
    /// Store the reading under this id (alias or raw key)
    Record(String),
}

impl Decision {
    pub fn is_record(&self) -> bool {
        matches!(self, Decision::Record(_))
    }
}

/// Most recent reading that got past the duplicate check
#[derive(Debug, Clone)]
struct LastSeen {
    key: String,
    time: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DedupEngine {
    sensors: SensorTree,
    last_seen: Option<LastSeen>,
    duplicate_window: TimeDelta,
    recording_interval: TimeDelta,
}

impl DedupEngine {
    pub fn new(
        sensors: SensorTree,
        duplicate_window: TimeDelta,
        recording_interval: TimeDelta,
    ) -> Self {
        Self {
            sensors,
            last_seen: None,
            duplicate_window,
            recording_interval,
        }
    }

    /// Decide what to do with a reading from `raw_key` taken at `event_time`.
    pub fn admit(&mut self, raw_key: &str, event_time: DateTime<Utc>) -> Decision {
        if let Some(last) = &self.last_seen {
            if last.key == raw_key && within(event_time, last.time, self.duplicate_window) {
                log::trace!("{} at {}: duplicate of {}", raw_key, event_time, last.time);
                return Decision::SuppressDuplicate;
            }
        }

        let id = self.sensor_for(raw_key);
        self.last_seen = Some(LastSeen {
            key: raw_key.to_string(),
            time: event_time,
        });

        let node = self.sensors.node_mut(id);
        if within(event_time, node.last_recorded, self.recording_interval) {
            log::trace!(
                "{} at {}: last stored {}, inside recording interval",
                raw_key,
                event_time,
                node.last_recorded
            );
            return Decision::SuppressRateLimited;
        }

        node.last_recorded = event_time;
        let effective = node.alias().unwrap_or(raw_key).to_string();
        Decision::Record(effective)
    }

    pub fn sensors(&self) -> &SensorTree {
        &self.sensors
    }

    fn sensor_for(&mut self, key: &str) -> NodeId {
        let known = self.sensors.len();
        let id = self.sensors.find_or_create(key);
        if self.sensors.len() > known {
            log::info!("📡 New sensor seen: {}", key);
        }
        id
    }
}

/// `time` falls before `start + window`; a window ending past the last
/// representable instant never closes
fn within(time: DateTime<Utc>, start: DateTime<Utc>, window: TimeDelta) -> bool {
    match start.checked_add_signed(window) {
        Some(end) => time < end,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: f64) -> DateTime<Utc> {
        // Well past the epoch so a fresh sensor is never rate limited by its zero timestamp
        let base = 1_745_000_000_i64 * 1_000;
        DateTime::from_timestamp_millis(base + (seconds * 1_000.0) as i64).unwrap()
    }

    fn engine(tree: SensorTree) -> DedupEngine {
        DedupEngine::new(tree, TimeDelta::seconds(2), TimeDelta::seconds(300))
    }

    #[test]
    fn test_repeat_inside_duplicate_window_is_suppressed() {
        let mut dedup = engine(SensorTree::new());

        assert!(dedup.admit("X/1/2", at(0.0)).is_record());
        assert_eq!(dedup.admit("X/1/2", at(1.0)), Decision::SuppressDuplicate);
        assert_eq!(dedup.admit("X/1/2", at(1.9)), Decision::SuppressDuplicate);
    }

    #[test]
    fn test_recording_interval_boundary() {
        let mut dedup = engine(SensorTree::new());

        assert!(dedup.admit("X/1/2", at(0.0)).is_record());
        assert_eq!(dedup.admit("X/1/2", at(299.0)), Decision::SuppressRateLimited);
        assert_eq!(dedup.admit("X/1/2", at(300.0)), Decision::Record("X/1/2".to_string()));
    }

    #[test]
    fn test_alias_is_substituted() {
        let mut tree = SensorTree::new();
        tree.bootstrap_alias("X/1/2", "Garage");
        let mut dedup = engine(tree);

        assert_eq!(dedup.admit("X/1/2", at(0.0)), Decision::Record("Garage".to_string()));
        assert_eq!(dedup.admit("Y/3/4", at(0.5)), Decision::Record("Y/3/4".to_string()));
    }

    #[test]
    fn test_garage_scenario() {
        let mut tree = SensorTree::new();
        tree.bootstrap_alias("X/1/2", "Garage");
        let mut dedup = engine(tree);

        assert_eq!(dedup.admit("X/1/2", at(0.0)), Decision::Record("Garage".to_string()));
        assert_eq!(dedup.admit("X/1/2", at(1.0)), Decision::SuppressDuplicate);
        assert_eq!(dedup.admit("X/1/2", at(301.0)), Decision::Record("Garage".to_string()));
        // Within 2s of the last seen reading (301s), regardless of what was stored
        assert_eq!(dedup.admit("X/1/2", at(301.5)), Decision::SuppressDuplicate);
        // Past the duplicate window but inside the recording interval
        assert_eq!(dedup.admit("X/1/2", at(304.0)), Decision::SuppressRateLimited);
    }

    #[test]
    fn test_duplicate_window_tracks_seen_not_stored() {
        let mut dedup = engine(SensorTree::new());

        assert!(dedup.admit("X/1/2", at(0.0)).is_record());
        // Rate limited, but still becomes the last seen reading
        assert_eq!(dedup.admit("X/1/2", at(10.0)), Decision::SuppressRateLimited);
        assert_eq!(dedup.admit("X/1/2", at(11.0)), Decision::SuppressDuplicate);
    }

    #[test]
    fn test_single_slot_is_global_across_sensors() {
        let mut dedup = engine(SensorTree::new());

        assert!(dedup.admit("A/1/1", at(0.0)).is_record());
        assert!(dedup.admit("B/1/1", at(0.1)).is_record());
        // B replaced A in the slot, so A's repeat is not a duplicate
        assert_eq!(dedup.admit("A/1/1", at(0.2)), Decision::SuppressRateLimited);
        assert_eq!(dedup.admit("A/1/1", at(0.3)), Decision::SuppressDuplicate);
    }

    #[test]
    fn test_stored_time_only_moves_forward() {
        let mut dedup = engine(SensorTree::new());

        assert!(dedup.admit("X/1/2", at(600.0)).is_record());
        assert!(dedup.admit("Y/1/2", at(601.0)).is_record());
        assert_eq!(dedup.admit("X/1/2", at(100.0)), Decision::SuppressRateLimited);

        let node = dedup.sensors().get("X/1/2").unwrap();
        assert_eq!(node.last_recorded, at(600.0));
    }

    #[test]
    fn test_readings_at_end_of_time_do_not_overflow() {
        let mut dedup = engine(SensorTree::new());
        let last = DateTime::<Utc>::MAX_UTC;

        assert_eq!(dedup.admit("X/1/2", last), Decision::Record("X/1/2".to_string()));
        assert_eq!(dedup.admit("X/1/2", last), Decision::SuppressDuplicate);

        // Another sensor takes the slot, so only the recording interval applies
        assert!(dedup.admit("Y/1/2", last).is_record());
        assert_eq!(dedup.admit("X/1/2", last), Decision::SuppressRateLimited);
    }

    #[test]
    fn test_first_reading_creates_sensor() {
        let mut dedup = engine(SensorTree::new());
        dedup.admit("New/7/", at(0.0));

        assert!(dedup.sensors().get("New/7/").is_some());
        assert_eq!(dedup.sensors().len(), 1);
    }
}
