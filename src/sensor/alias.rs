//! Sensor alias table
//!
//! Same text format as the config file. Every `key = value` line maps a
//! sensor key (`model/id/channel`) to the name stored in its place; section
//! headers are accepted and ignored.

use crate::params::ini::{self, ConfigEntry};
use crate::params::locate_file;
use crate::sensor::tree::SensorTree;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Find the alias file, trying `alias_file` as given and then each
/// directory of `search_path`.
pub fn open_alias_file(alias_file: &str, search_path: &str) -> Option<(PathBuf, File)> {
    if let Ok(file) = File::open(alias_file) {
        return Some((PathBuf::from(alias_file), file));
    }
    log::debug!("Searching {} for sensor alias file {}", search_path, alias_file);
    locate_file(alias_file, search_path)
}

/// Read the alias table and record every alias in `tree`.
///
/// A missing or unreadable file leaves the tree untouched. Returns the
/// number of alias lines applied.
pub fn bootstrap_aliases(tree: &mut SensorTree, alias_file: &str, search_path: &str) -> usize {
    let Some((path, file)) = open_alias_file(alias_file, search_path) else {
        log::info!("No sensor alias file '{}' found, sensors keep their own ids", alias_file);
        return 0;
    };

    match ini::parse(BufReader::new(file)) {
        Ok(entries) => {
            log::info!("🏷️  Loading sensor aliases from {}", path.display());
            let applied = apply_aliases(tree, &entries);
            tree.log_sensors("Aliases loaded from alias file");
            applied
        }
        Err(e) => {
            log::error!("Could not parse sensor alias file '{}': {}", path.display(), e);
            0
        }
    }
}

/// Apply parsed alias entries in file order; a repeated key keeps the last alias.
pub fn apply_aliases(tree: &mut SensorTree, entries: &[ConfigEntry]) -> usize {
    for entry in entries {
        log::trace!("   [{}] {} -> {}", entry.section, entry.key, entry.value);
        tree.bootstrap_alias(&entry.key, &entry.value);
    }
    entries.len()
}
