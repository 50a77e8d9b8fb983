use crate::model::{Dataset, EngineSettings, MonthlySource, MonthlyTop, MonthlyTopSong, SongRecord};
use crate::stats::{MS_PER_MINUTE, round_to};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

const MONTH_PREFIX_CHARS: usize = 7;

#[derive(Debug)]
struct MonthTotals {
    album: Option<String>,
    play_count: u64,
    ms_played: u64,
}

/// Calendar month used to anchor the demonstration series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: time::Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    pub fn current_utc() -> Self {
        Self::from_date(time::OffsetDateTime::now_utc().date())
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// First seven characters of the timestamp, e.g. `2024-01` out of
/// `2024-01-15T10:00:00Z`.
pub(crate) fn month_of(timestamp: &str) -> Option<String> {
    let prefix: String = timestamp.chars().take(MONTH_PREFIX_CHARS).collect();
    (prefix.chars().count() == MONTH_PREFIX_CHARS).then_some(prefix)
}

/// Most played song of every month that has at least one event with a
/// timestamp, a track name and a play time. Newest month first.
///
/// Within a month, keys are scanned in (song, artist) order and only a
/// strictly higher play count replaces the current leader, so ties go to
/// the smallest key.
pub fn monthly_top(dataset: &Dataset) -> Vec<MonthlyTopSong> {
    let mut by_month: BTreeMap<String, BTreeMap<(String, Option<String>), MonthTotals>> =
        BTreeMap::new();

    for event in dataset.events() {
        let (Some(timestamp), Some(track), Some(ms_played)) =
            (&event.timestamp, &event.track, event.ms_played)
        else {
            continue;
        };
        let Some(month) = month_of(timestamp) else {
            continue;
        };

        let totals = by_month
            .entry(month)
            .or_default()
            .entry((track.clone(), event.artist.clone()))
            .or_insert_with(|| MonthTotals {
                album: event.album.clone(),
                play_count: 0,
                ms_played: 0,
            });
        totals.play_count = totals.play_count.saturating_add(1);
        totals.ms_played = totals.ms_played.saturating_add(ms_played);
    }

    by_month
        .into_iter()
        .rev()
        .filter_map(|(month, songs)| {
            let mut leader: Option<((String, Option<String>), MonthTotals)> = None;
            for (key, totals) in songs {
                let leads = leader
                    .as_ref()
                    .is_none_or(|(_, best)| totals.play_count > best.play_count);
                if leads {
                    leader = Some((key, totals));
                }
            }

            leader.map(|((song, artist), totals)| MonthlyTopSong {
                month,
                song,
                artist,
                album: totals.album,
                plays: totals.play_count,
                minutes_played: round_to(totals.ms_played as f64 / MS_PER_MINUTE, 1),
            })
        })
        .collect()
}

/// Display fallback for histories without usable timestamps: the top songs
/// overall spread over the `demo_months` months ending at `anchor`, with
/// plays divided by `demo_play_divisor`.
pub fn demonstration_series(
    songs: &[SongRecord],
    anchor: YearMonth,
    settings: &EngineSettings,
) -> Vec<MonthlyTopSong> {
    let mut ranked: Vec<&SongRecord> = songs.iter().collect();
    ranked.sort_by(|a, b| b.plays.cmp(&a.plays));
    if ranked.is_empty() {
        return Vec::new();
    }

    let divisor = u64::from(settings.demo_play_divisor.max(1));
    let mut month = anchor;
    let mut series = Vec::with_capacity(usize::from(settings.demo_months));
    for index in 0..usize::from(settings.demo_months) {
        let song = ranked[index % ranked.len()];
        let plays = (song.plays / divisor).max(1);
        let scale = plays as f64 / song.plays.max(1) as f64;
        series.push(MonthlyTopSong {
            month: month.to_string(),
            song: song.song.clone(),
            artist: Some(song.artist.clone()),
            album: song.album.clone(),
            plays,
            minutes_played: round_to(song.minutes * scale, 1),
        });
        month = month.previous();
    }
    series
}

/// Real monthly leaders, or the demonstration series when the history has
/// songs but no month could be derived from it. The two are never mixed.
pub fn monthly_top_or_demo(
    dataset: &Dataset,
    songs: &[SongRecord],
    anchor: YearMonth,
    settings: &EngineSettings,
) -> MonthlyTop {
    let observed = monthly_top(dataset);
    if !observed.is_empty() || songs.is_empty() {
        return MonthlyTop {
            source: MonthlySource::Observed,
            months: observed,
        };
    }

    info!(
        anchor = %anchor,
        months = settings.demo_months,
        "no timestamped plays, using demonstration monthly series"
    );
    MonthlyTop {
        source: MonthlySource::Demonstration,
        months: demonstration_series(songs, anchor, settings),
    }
}
