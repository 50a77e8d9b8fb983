use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One play record. Every field is optional; consumers decide which ones
/// they need and skip events that lack them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub track: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_uri: Option<String>,
    pub ms_played: Option<u64>,
    pub timestamp: Option<String>,
}

/// Normalized events keyed by source file. Files iterate in lexicographic
/// order, events in the order they appeared in their file.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    files: BTreeMap<String, Vec<Event>>,
}

impl Dataset {
    pub fn from_files(files: BTreeMap<String, Vec<Event>>) -> Self {
        Self { files }
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.files.values().flatten()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn event_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRecord {
    #[serde(rename = "Song")]
    pub song: String,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Album")]
    pub album: Option<String>,
    #[serde(rename = "Plays")]
    pub plays: u64,
    #[serde(rename = "Minutes Played")]
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumRecord {
    #[serde(rename = "Album")]
    pub album: String,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Plays")]
    pub plays: u64,
    #[serde(rename = "Minutes Played")]
    pub minutes: f64,
    #[serde(rename = "Songs")]
    pub songs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRecord {
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Plays")]
    pub plays: u64,
    #[serde(rename = "Minutes Played")]
    pub minutes: f64,
    #[serde(rename = "Songs")]
    pub songs: u64,
    #[serde(rename = "Albums")]
    pub albums: u64,
}

/// A row of any aggregation level, serialized flat with its display columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Song(SongRecord),
    Album(AlbumRecord),
    Artist(ArtistRecord),
}

impl Record {
    pub fn plays(&self) -> u64 {
        match self {
            Self::Song(record) => record.plays,
            Self::Album(record) => record.plays,
            Self::Artist(record) => record.plays,
        }
    }

    pub fn minutes(&self) -> f64 {
        match self {
            Self::Song(record) => record.minutes,
            Self::Album(record) => record.minutes,
            Self::Artist(record) => record.minutes,
        }
    }

    pub fn as_song(&self) -> Option<&SongRecord> {
        match self {
            Self::Song(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_album(&self) -> Option<&AlbumRecord> {
        match self {
            Self::Album(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_artist(&self) -> Option<&ArtistRecord> {
        match self {
            Self::Artist(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationLevel {
    Song,
    Album,
    Artist,
}

impl AggregationLevel {
    pub const ALL: [Self; 3] = [Self::Song, Self::Album, Self::Artist];

    pub fn label(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AggregationLevel {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "song" | "songs" => Ok(Self::Song),
            "album" | "albums" => Ok(Self::Album),
            "artist" | "artists" => Ok(Self::Artist),
            _ => Err(EngineError::UnknownAggregationLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Album,
    Artist,
}

impl DetailKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DetailKind {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            _ => Err(EngineError::UnknownDetailType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSummary {
    pub total_plays: u64,
    pub total_minutes: f64,
    pub song_count: u64,
}

/// Song-level records belonging to one album or artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detail {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DetailKind,
    #[serde(rename = "data")]
    pub records: Vec<SongRecord>,
    pub summary: DetailSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTopSong {
    pub month: String,
    pub song: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub plays: u64,
    pub minutes_played: f64,
}

impl MonthlyTopSong {
    /// "January 2024" for "2024-01"; anything unparseable is returned as-is.
    pub fn month_label(&self) -> String {
        let parsed = self.month.split_once('-').and_then(|(year, month)| {
            let year: i32 = year.parse().ok()?;
            let month: u8 = month.parse().ok()?;
            let month = time::Month::try_from(month).ok()?;
            Some(format!("{month} {year}"))
        });
        parsed.unwrap_or_else(|| self.month.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthlySource {
    Observed,
    Demonstration,
}

/// Newest month first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTop {
    pub source: MonthlySource,
    #[serde(rename = "data")]
    pub months: Vec<MonthlyTopSong>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOverview {
    pub files: usize,
    pub events: usize,
    pub valid_plays: u64,
    pub songs: usize,
    pub albums: usize,
    pub artists: usize,
    pub total_minutes: f64,
    pub first_month: Option<String>,
    pub last_month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_demo_months")]
    pub demo_months: u8,
    #[serde(default = "default_demo_play_divisor")]
    pub demo_play_divisor: u32,
    #[serde(default = "default_history_files_only")]
    pub history_files_only: bool,
}

fn default_demo_months() -> u8 {
    6
}

fn default_demo_play_divisor() -> u32 {
    12
}

fn default_history_files_only() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            demo_months: default_demo_months(),
            demo_play_divisor: default_demo_play_divisor(),
            history_files_only: default_history_files_only(),
        }
    }
}
