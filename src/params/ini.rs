//! `.ini`-style structured configuration parser
//!
//! Turns section/key/value text into an ordered list of entries. The parser
//! knows nothing about parameter semantics: the config file and the sensor
//! alias table are both read through here.
//!
//! Line rules:
//! - `#` starts a comment that runs to end of line
//! - blank lines are skipped
//! - `[Section]` sets the section recorded on following entries
//! - `key = value` is recorded with both sides trimmed
//! - anything else is ignored

use std::collections::TryReserveError;
use std::io::BufRead;
use thiserror::Error;

const COMMENT_MARKER: char = '#';

/// One `key = value` line, tagged with the section it appeared under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub section: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum IniError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to grow entry list: {0}")]
    Capacity(#[from] TryReserveError),
}

/// Parse every line of `reader` into entries, in file order.
///
/// Malformed section headers and lines without `=` are tolerated silently.
/// Only a read failure or running out of memory for the entry list is an error.
pub fn parse<R: BufRead>(mut reader: R) -> Result<Vec<ConfigEntry>, IniError> {
    let mut entries: Vec<ConfigEntry> = Vec::new();
    let mut section = String::new();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }

        let content = match line.find(COMMENT_MARKER) {
            Some(at) => &line[..at],
            None => line.as_str(),
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        if let Some(header) = content.strip_prefix('[') {
            // Without a closing bracket the header is ignored and the section is kept
            if let Some(end) = header.find(']') {
                section = header[..end].trim().to_string();
            }
            continue;
        }

        if let Some((key, value)) = content.split_once('=') {
            entries.try_reserve(1)?;
            entries.push(ConfigEntry {
                section: section.clone(),
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(text: &str) -> Vec<ConfigEntry> {
        parse(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_sections_keys_and_comments() {
        let entries = parse_str(
            "# leading comment\n\
             host = broker.local   # trailing comment\n\
             \n\
             [MQTT]\n\
             topic=rtl_433/+/events\n\
             [ Database ]\n\
               sql3file =  Weather.db  \n",
        );

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].section, "");
        assert_eq!(entries[0].key, "host");
        assert_eq!(entries[0].value, "broker.local");
        assert_eq!(entries[1].section, "MQTT");
        assert_eq!(entries[1].value, "rtl_433/+/events");
        assert_eq!(entries[2].section, "Database");
        assert_eq!(entries[2].key, "sql3file");
        assert_eq!(entries[2].value, "Weather.db");
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let entries = parse_str(
            "[Good]\n\
             just some words\n\
             [Broken\n\
             port = 1884\n",
        );

        assert_eq!(entries.len(), 1);
        // Unterminated header does not replace the current section
        assert_eq!(entries[0].section, "Good");
        assert_eq!(entries[0].key, "port");
    }

    #[test]
    fn test_duplicate_keys_kept_in_file_order() {
        let entries = parse_str("port = 1\nport = 2\n");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "1");
        assert_eq!(entries[1].value, "2");
    }

    #[test]
    fn test_value_may_contain_equals_and_be_empty() {
        let entries = parse_str("a = b=c\nempty =\n");

        assert_eq!(entries[0].key, "a");
        assert_eq!(entries[0].value, "b=c");
        assert_eq!(entries[1].key, "empty");
        assert_eq!(entries[1].value, "");
    }

    #[test]
    fn test_invalid_utf8_is_an_io_error() {
        let bytes: &[u8] = &[b'k', b'=', 0xff, 0xfe, b'\n'];
        assert!(matches!(parse(Cursor::new(bytes)), Err(IniError::Io(_))));
    }
}
