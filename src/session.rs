//! Aggregation sessions and the registry holding the current one.
//!
//! A [`Session`] owns one loaded history and every view derived from it.
//! Each view lives in its own once-cell and is computed on first request;
//! sorted views go through the session's [`SortCache`]. The
//! [`SessionRegistry`] swaps whole sessions: a new one is fully built before
//! it replaces the old one, so readers never see a half-loaded history.

use crate::error::{EngineError, Result};
use crate::events::{self, RawDataset};
use crate::model::{
    AggregationLevel, Dataset, Detail, DetailKind, EngineSettings, MonthlyTop, Record,
    SessionOverview, SongRecord,
};
use crate::monthly::{self, YearMonth};
use crate::sorting::{Column, SortCache, SortDirection, SortKey, SortedView};
use crate::stats;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: OffsetDateTime,
    anchor: YearMonth,
    settings: EngineSettings,
    dataset: Dataset,
    songs: OnceLock<Arc<[SongRecord]>>,
    song_view: OnceLock<SortedView>,
    album_view: OnceLock<SortedView>,
    artist_view: OnceLock<SortedView>,
    sorted: SortCache,
    monthly: OnceLock<Arc<MonthlyTop>>,
}

impl Session {
    /// Normalizes `raw` into a new session. Any malformed file fails the
    /// whole load.
    pub fn new(id: SessionId, raw: &RawDataset, settings: EngineSettings) -> Result<Self> {
        let dataset = events::normalize(raw)?;
        let created_at = OffsetDateTime::now_utc();
        Ok(Self::from_dataset(
            id,
            dataset,
            settings,
            created_at,
            YearMonth::from_date(created_at.date()),
        ))
    }

    pub fn from_dataset(
        id: SessionId,
        dataset: Dataset,
        settings: EngineSettings,
        created_at: OffsetDateTime,
        anchor: YearMonth,
    ) -> Self {
        Self {
            id,
            created_at,
            anchor,
            settings,
            dataset,
            songs: OnceLock::new(),
            song_view: OnceLock::new(),
            album_view: OnceLock::new(),
            artist_view: OnceLock::new(),
            sorted: SortCache::new(),
            monthly: OnceLock::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn songs(&self) -> Arc<[SongRecord]> {
        let songs = self.songs.get_or_init(|| {
            let songs = stats::aggregate_songs(&self.dataset);
            debug!(session = %self.id, rows = songs.len(), "aggregated songs");
            songs.into()
        });
        Arc::clone(songs)
    }

    /// Base view of `level`: songs in (song, artist) order, albums and
    /// artists most played first.
    pub fn aggregation(&self, level: AggregationLevel) -> SortedView {
        let slot = match level {
            AggregationLevel::Song => &self.song_view,
            AggregationLevel::Album => &self.album_view,
            AggregationLevel::Artist => &self.artist_view,
        };
        let view = slot.get_or_init(|| {
            let songs = self.songs();
            let records: Vec<Record> = match level {
                AggregationLevel::Song => songs.iter().cloned().map(Record::Song).collect(),
                AggregationLevel::Album => stats::aggregate_albums(&songs)
                    .into_iter()
                    .map(Record::Album)
                    .collect(),
                AggregationLevel::Artist => stats::aggregate_artists(&songs)
                    .into_iter()
                    .map(Record::Artist)
                    .collect(),
            };
            debug!(session = %self.id, level = %level, rows = records.len(), "cached base view");
            records.into()
        });
        Arc::clone(view)
    }

    /// Sorted view by column name and direction word. Unknown columns fall
    /// back to `Plays`; anything but `desc` sorts ascending.
    pub fn sorted(&self, level: AggregationLevel, column: &str, direction: &str) -> SortedView {
        self.sorted_by(SortKey {
            level,
            column: Column::resolve(level, column),
            direction: SortDirection::parse(direction),
        })
    }

    pub fn sorted_by(&self, key: SortKey) -> SortedView {
        self.sorted.get_or_sort(key, || self.aggregation(key.level))
    }

    pub fn cached_sort_count(&self) -> usize {
        self.sorted.len()
    }

    pub fn detail(&self, kind: DetailKind, name: &str) -> Detail {
        let detail = stats::detail(&self.songs(), kind, name);
        debug!(session = %self.id, kind = %kind, name, rows = detail.records.len(), "built detail");
        detail
    }

    pub fn monthly_top(&self) -> Arc<MonthlyTop> {
        let top = self.monthly.get_or_init(|| {
            let songs = self.songs();
            Arc::new(monthly::monthly_top_or_demo(
                &self.dataset,
                &songs,
                self.anchor,
                &self.settings,
            ))
        });
        Arc::clone(top)
    }

    pub fn search(&self, level: AggregationLevel, query: &str) -> Vec<Record> {
        stats::search(&self.aggregation(level), query)
    }

    pub fn overview(&self) -> SessionOverview {
        let songs = self.songs();
        let months: BTreeSet<String> = self
            .dataset
            .events()
            .filter_map(|event| event.timestamp.as_deref())
            .filter_map(monthly::month_of)
            .collect();

        SessionOverview {
            files: self.dataset.file_count(),
            events: self.dataset.event_count(),
            valid_plays: songs.iter().map(|song| song.plays).sum(),
            songs: songs.len(),
            albums: self.aggregation(AggregationLevel::Album).len(),
            artists: self.aggregation(AggregationLevel::Artist).len(),
            total_minutes: stats::round_to(songs.iter().map(|song| song.minutes).sum(), 1),
            first_month: months.first().cloned(),
            last_month: months.last().cloned(),
        }
    }
}

/// Holds the current session. Queries made before the first successful load
/// fail with [`EngineError::NoSessionLoaded`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: RwLock<Option<Arc<Session>>>,
    next_id: AtomicU64,
    settings: EngineSettings,
}

impl SessionRegistry {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            current: RwLock::new(None),
            next_id: AtomicU64::new(0),
            settings,
        }
    }

    /// Builds a session from `raw` and makes it current. On error the
    /// previous session, if any, stays current.
    pub fn load(&self, raw: RawDataset) -> Result<Arc<Session>> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let session = Arc::new(Session::new(id, &raw, self.settings.clone())?);
        info!(
            session = %id,
            files = session.dataset().file_count(),
            events = session.dataset().event_count(),
            "loaded listening history"
        );

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(Arc::clone(&session)) {
            debug!(previous = %previous.id(), session = %id, "replaced session");
        }
        Ok(session)
    }

    /// Decodes raw file bytes and loads them as in [`SessionRegistry::load`].
    pub fn load_bytes(&self, files: BTreeMap<String, Vec<u8>>) -> Result<Arc<Session>> {
        let raw = events::decode_files(files)?;
        self.load(raw)
    }

    pub fn current(&self) -> Result<Arc<Session>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(EngineError::NoSessionLoaded)
    }

    pub fn clear(&self) {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn aggregation(&self, level: &str) -> Result<SortedView> {
        let session = self.current()?;
        let level: AggregationLevel = level.parse()?;
        Ok(session.aggregation(level))
    }

    pub fn sorted(&self, level: &str, column: &str, direction: &str) -> Result<SortedView> {
        let session = self.current()?;
        let level: AggregationLevel = level.parse()?;
        Ok(session.sorted(level, column, direction))
    }

    pub fn detail(&self, kind: &str, name: &str) -> Result<Detail> {
        let session = self.current()?;
        let kind: DetailKind = kind.parse()?;
        Ok(session.detail(kind, name))
    }

    pub fn monthly_top(&self) -> Result<Arc<MonthlyTop>> {
        Ok(self.current()?.monthly_top())
    }

    pub fn search(&self, level: &str, query: &str) -> Result<Vec<Record>> {
        let session = self.current()?;
        let level: AggregationLevel = level.parse()?;
        Ok(session.search(level, query))
    }

    pub fn overview(&self) -> Result<SessionOverview> {
        Ok(self.current()?.overview())
    }
}
