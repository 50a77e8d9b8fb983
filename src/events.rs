//! Turns raw history files into a [`Dataset`].
//!
//! Only the container shape is validated: each file must be a JSON array of
//! objects. Individual fields are picked up when present with the expected
//! JSON type and left empty otherwise; aggregators decide what they need.

use crate::error::{EngineError, Result};
use crate::model::{Dataset, Event};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// File name to undecoded JSON content.
pub type RawDataset = BTreeMap<String, Value>;

const TRACK_KEYS: &[&str] = &["master_metadata_track_name", "trackName"];
const ARTIST_KEYS: &[&str] = &["master_metadata_album_artist_name", "artistName"];
const ALBUM_KEYS: &[&str] = &["master_metadata_album_album_name", "albumName"];
const TRACK_URI_KEYS: &[&str] = &["spotify_track_uri", "trackUri"];
const MS_PLAYED_KEYS: &[&str] = &["ms_played", "msPlayed"];
const TIMESTAMP_KEYS: &[&str] = &["ts", "endTime"];

/// Parses file contents as JSON. The first file that is not valid JSON fails
/// the whole batch.
pub fn decode_files(files: BTreeMap<String, Vec<u8>>) -> Result<RawDataset> {
    let mut raw = RawDataset::new();
    for (name, bytes) in files {
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| EngineError::malformed(&name, format!("invalid JSON: {err}")))?;
        raw.insert(name, value);
    }
    Ok(raw)
}

pub fn normalize(raw: &RawDataset) -> Result<Dataset> {
    let mut files = BTreeMap::new();
    for (name, value) in raw {
        files.insert(name.clone(), normalize_file(name, value)?);
    }
    Ok(Dataset::from_files(files))
}

fn normalize_file(name: &str, value: &Value) -> Result<Vec<Event>> {
    let Value::Array(items) = value else {
        return Err(EngineError::malformed(
            name,
            format!("expected an array of play records, found {}", json_kind(value)),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(normalize_event(fields)),
            other => Err(EngineError::malformed(
                name,
                format!("record {index} is {}, not an object", json_kind(other)),
            )),
        })
        .collect()
}

fn normalize_event(fields: &Map<String, Value>) -> Event {
    Event {
        track: text_field(fields, TRACK_KEYS),
        artist: text_field(fields, ARTIST_KEYS),
        album: text_field(fields, ALBUM_KEYS),
        track_uri: text_field(fields, TRACK_URI_KEYS),
        ms_played: ms_field(fields, MS_PLAYED_KEYS),
        timestamp: text_field(fields, TIMESTAMP_KEYS),
    }
}

fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(fields, keys)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn ms_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    let value = first_present(fields, keys)?;
    if let Some(ms) = value.as_u64() {
        return Some(ms);
    }
    value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms as u64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
