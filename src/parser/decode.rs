//! Line-oriented decoding of metadata dump output

use crate::metadata::VideoInfo;
use crate::types::ParsedEntry;
use serde_json::Value;

/// Incremental decoder for `--dump-json` style output
///
/// Each line is decoded on its own. Lines that are not valid JSON are skipped and,
/// until the first entry decodes, kept aside; if the whole run produced no entry, [`finish`](Self::finish) retries
/// the kept text as one pretty-printed document (the `-J` shape).
#[derive(Debug, Default)]
pub struct OutputDecoder {
    emitted: usize,
    skipped: usize,
    dropped: usize,
    unparsed: Vec<String>,
    saw_output: bool,
}

impl OutputDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one stdout line
    pub fn push_line(&mut self, line: &str) -> Vec<ParsedEntry> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        self.saw_output = true;

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                let entries = self.entries_from_document(value);
                if entries.is_empty() {
                    tracing::debug!(line = %truncate(trimmed), "Line held no usable record");
                }
                entries
            }
            Err(e) => {
                self.skipped += 1;
                tracing::warn!(error = %e, line = %truncate(trimmed), "Skipping malformed metadata line");
                if self.emitted == 0 {
                    self.unparsed.push(trimmed.to_string());
                }
                Vec::new()
            }
        }
    }

    /// End of output: retry buffered text as a single document if nothing decoded
    pub fn finish(&mut self) -> Vec<ParsedEntry> {
        if self.emitted > 0 || self.unparsed.is_empty() {
            return Vec::new();
        }

        let document = std::mem::take(&mut self.unparsed).join("\n");
        match serde_json::from_str::<Value>(&document) {
            Ok(value) => {
                let entries = self.entries_from_document(value);
                if !entries.is_empty() {
                    self.skipped = 0;
                }
                entries
            }
            Err(e) => {
                tracing::debug!(error = %e, "Buffered output is not a JSON document either");
                Vec::new()
            }
        }
    }

    /// Entries produced so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Lines that failed to decode
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Decoded records discarded for lacking an ID
    pub fn dropped_records(&self) -> usize {
        self.dropped
    }

    /// Whether any non-blank stdout line was seen
    pub fn saw_output(&self) -> bool {
        self.saw_output
    }

    fn entries_from_document(&mut self, value: Value) -> Vec<ParsedEntry> {
        let records: Vec<Value> = match value {
            Value::Object(map) if is_playlist_document(&map) => expand_playlist(map),
            Value::Object(map) => vec![Value::Object(map)],
            Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
            _ => Vec::new(),
        };

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match VideoInfo::from_value(record) {
                Ok(info) => match info.into_entry() {
                    Some(entry) => entries.push(entry),
                    None => self.dropped += 1,
                },
                Err(e) => {
                    self.dropped += 1;
                    tracing::warn!(error = %e, "Record does not match the expected shape");
                }
            }
        }
        self.emitted += entries.len();
        if self.emitted > 0 {
            // finish() never retries once something decoded
            self.unparsed.clear();
        }
        entries
    }
}

fn is_playlist_document(map: &serde_json::Map<String, Value>) -> bool {
    map.get("_type").and_then(Value::as_str) == Some("playlist")
        && map.get("entries").is_some_and(Value::is_array)
}

/// Flatten a `-J` playlist document into member records that carry playlist context
fn expand_playlist(mut map: serde_json::Map<String, Value>) -> Vec<Value> {
    let title = map.get("title").cloned().unwrap_or(Value::Null);
    let playlist_id = map.get("id").cloned().unwrap_or(Value::Null);
    let Some(Value::Array(members)) = map.remove("entries") else {
        return Vec::new();
    };
    let count = members.len();

    members
        .into_iter()
        .enumerate()
        .filter_map(|(i, member)| match member {
            Value::Object(mut m) => {
                set_if_missing(&mut m, "playlist", playlist_id.clone());
                set_if_missing(&mut m, "playlist_title", title.clone());
                set_if_missing(&mut m, "playlist_index", Value::from(i + 1));
                set_if_missing(&mut m, "playlist_count", Value::from(count));
                Some(Value::Object(m))
            }
            _ => None,
        })
        .collect()
}

fn set_if_missing(map: &mut serde_json::Map<String, Value>, key: &str, value: Value) {
    let missing = map.get(key).is_none_or(Value::is_null);
    if missing && !value.is_null() {
        map.insert(key.to_string(), value);
    }
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(120) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
