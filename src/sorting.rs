//! Column resolution, record sorting and the per-session sort cache.

use crate::model::{AggregationLevel, Record};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// A sorted (or base) view shared by every caller that asks for it.
pub type SortedView = Arc<[Record]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Song,
    Artist,
    Album,
    Plays,
    MinutesPlayed,
    Songs,
    Albums,
}

const SONG_COLUMNS: &[Column] = &[
    Column::Song,
    Column::Artist,
    Column::Album,
    Column::Plays,
    Column::MinutesPlayed,
];
const ALBUM_COLUMNS: &[Column] = &[
    Column::Album,
    Column::Artist,
    Column::Plays,
    Column::MinutesPlayed,
    Column::Songs,
];
const ARTIST_COLUMNS: &[Column] = &[
    Column::Artist,
    Column::Plays,
    Column::MinutesPlayed,
    Column::Songs,
    Column::Albums,
];

impl Column {
    pub const DEFAULT: Self = Self::Plays;

    pub fn name(self) -> &'static str {
        match self {
            Self::Song => "Song",
            Self::Artist => "Artist",
            Self::Album => "Album",
            Self::Plays => "Plays",
            Self::MinutesPlayed => "Minutes Played",
            Self::Songs => "Songs",
            Self::Albums => "Albums",
        }
    }

    pub fn for_level(level: AggregationLevel) -> &'static [Self] {
        match level {
            AggregationLevel::Song => SONG_COLUMNS,
            AggregationLevel::Album => ALBUM_COLUMNS,
            AggregationLevel::Artist => ARTIST_COLUMNS,
        }
    }

    /// Exact name first, then a case-insensitive match, then `Plays`.
    /// Unknown names never fail.
    pub fn resolve(level: AggregationLevel, requested: &str) -> Self {
        let known = Self::for_level(level);
        if let Some(column) = known.iter().find(|column| column.name() == requested) {
            return *column;
        }
        if let Some(column) = known
            .iter()
            .find(|column| column.name().eq_ignore_ascii_case(requested.trim()))
        {
            return *column;
        }

        warn!(
            level = %level,
            requested,
            fallback = Self::DEFAULT.name(),
            "unknown sort column"
        );
        Self::DEFAULT
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// `desc` in any case sorts descending; everything else is ascending.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub level: AggregationLevel,
    pub column: Column,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    /// The column does not exist on one of the records.
    MissingColumn(Column),
    /// A value in the column has no ordering (NaN minutes).
    Incomparable(Column),
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "records have no '{column}' column"),
            Self::Incomparable(column) => write!(f, "'{column}' holds incomparable values"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SortValue<'a> {
    Text(Option<&'a str>),
    Number(f64),
}

fn sort_value(record: &Record, column: Column) -> Option<SortValue<'_>> {
    let value = match (record, column) {
        (Record::Song(song), Column::Song) => SortValue::Text(Some(song.song.as_str())),
        (Record::Song(song), Column::Artist) => SortValue::Text(Some(song.artist.as_str())),
        (Record::Song(song), Column::Album) => SortValue::Text(song.album.as_deref()),
        (Record::Album(album), Column::Album) => SortValue::Text(Some(album.album.as_str())),
        (Record::Album(album), Column::Artist) => SortValue::Text(Some(album.artist.as_str())),
        (Record::Album(album), Column::Songs) => SortValue::Number(album.songs as f64),
        (Record::Artist(artist), Column::Artist) => SortValue::Text(Some(artist.artist.as_str())),
        (Record::Artist(artist), Column::Songs) => SortValue::Number(artist.songs as f64),
        (Record::Artist(artist), Column::Albums) => SortValue::Number(artist.albums as f64),
        (record, Column::Plays) => SortValue::Number(record.plays() as f64),
        (record, Column::MinutesPlayed) => SortValue::Number(record.minutes()),
        _ => return None,
    };
    Some(value)
}

fn compare_values(a: SortValue<'_>, b: SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Text(a), SortValue::Text(b)) => a.cmp(&b),
        (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(&b),
        (SortValue::Text(_), SortValue::Number(_)) => Ordering::Less,
        (SortValue::Number(_), SortValue::Text(_)) => Ordering::Greater,
    }
}

/// Stable sort on one column. Equal values keep their base order in both
/// directions.
pub fn sort_records(
    records: &[Record],
    column: Column,
    direction: SortDirection,
) -> Result<Vec<Record>, SortError> {
    let values = records
        .iter()
        .map(|record| sort_value(record, column).ok_or(SortError::MissingColumn(column)))
        .collect::<Result<Vec<_>, _>>()?;
    if values
        .iter()
        .any(|value| matches!(value, SortValue::Number(number) if number.is_nan()))
    {
        return Err(SortError::Incomparable(column));
    }

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        let ordering = compare_values(values[a], values[b]);
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    Ok(order.into_iter().map(|index| records[index].clone()).collect())
}

/// Memoized sorted views. Each key owns its own once-cell, so a slow sort
/// only blocks callers waiting on that same key.
#[derive(Debug, Default)]
pub struct SortCache {
    slots: Mutex<HashMap<SortKey, Arc<OnceLock<SortedView>>>>,
}

impl SortCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached view for `key`, sorting `base()` on first use. A
    /// failed sort caches and returns the base view unchanged.
    pub fn get_or_sort<F>(&self, key: SortKey, base: F) -> SortedView
    where
        F: FnOnce() -> SortedView,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };

        let view = slot.get_or_init(|| {
            let base = base();
            match sort_records(&base, key.column, key.direction) {
                Ok(sorted) => {
                    debug!(
                        level = %key.level,
                        column = %key.column,
                        direction = key.direction.label(),
                        rows = sorted.len(),
                        "cached sorted view"
                    );
                    sorted.into()
                }
                Err(err) => {
                    warn!(
                        level = %key.level,
                        column = %key.column,
                        error = %err,
                        "sort failed, serving unsorted view"
                    );
                    base
                }
            }
        });
        Arc::clone(view)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
