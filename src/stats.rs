use crate::model::{
    AlbumRecord, ArtistRecord, Dataset, Detail, DetailKind, DetailSummary, Record, SongRecord,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub(crate) const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug)]
struct SongTotals {
    album: Option<String>,
    play_count: u64,
    ms_played: u64,
}

#[derive(Debug, Default)]
struct AlbumTotals {
    play_count: u64,
    minutes: f64,
    songs: u64,
}

#[derive(Debug, Default)]
struct ArtistTotals<'a> {
    play_count: u64,
    minutes: f64,
    songs: u64,
    albums: BTreeSet<&'a str>,
}

/// Rounds the exact binary value of `value` to `decimals` places. Only a
/// value sitting exactly on the midpoint goes to the even neighbour, so
/// `0.005` (stored slightly above) becomes `0.01`.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

/// Groups events by (track, artist). Events without a track, artist or
/// play time are skipped. The album is taken from the first event of each
/// key. Records come back ordered by (song, artist).
pub fn aggregate_songs(dataset: &Dataset) -> Vec<SongRecord> {
    let mut by_song: BTreeMap<(String, String), SongTotals> = BTreeMap::new();

    for event in dataset.events() {
        let (Some(track), Some(artist), Some(ms_played)) =
            (&event.track, &event.artist, event.ms_played)
        else {
            continue;
        };

        let totals = by_song
            .entry((track.clone(), artist.clone()))
            .or_insert_with(|| SongTotals {
                album: event.album.clone(),
                play_count: 0,
                ms_played: 0,
            });
        totals.play_count = totals.play_count.saturating_add(1);
        totals.ms_played = totals.ms_played.saturating_add(ms_played);
    }

    by_song
        .into_iter()
        .map(|((song, artist), totals)| SongRecord {
            song,
            artist,
            album: totals.album,
            plays: totals.play_count,
            minutes: round_to(totals.ms_played as f64 / MS_PER_MINUTE, 2),
        })
        .collect()
}

/// Rolls songs up per (album, artist). Songs without an album are left out.
/// Minutes are the song minutes re-rounded to one decimal.
pub fn aggregate_albums(songs: &[SongRecord]) -> Vec<AlbumRecord> {
    let mut by_album: BTreeMap<(&str, &str), AlbumTotals> = BTreeMap::new();

    for song in songs {
        let Some(album) = song.album.as_deref() else {
            continue;
        };
        let totals = by_album.entry((album, song.artist.as_str())).or_default();
        totals.play_count = totals.play_count.saturating_add(song.plays);
        totals.minutes += song.minutes;
        totals.songs += 1;
    }

    let mut albums: Vec<AlbumRecord> = by_album
        .into_iter()
        .map(|((album, artist), totals)| AlbumRecord {
            album: album.to_string(),
            artist: artist.to_string(),
            plays: totals.play_count,
            minutes: round_to(totals.minutes, 1),
            songs: totals.songs,
        })
        .collect();
    albums.sort_by(|a, b| b.plays.cmp(&a.plays));
    albums
}

/// Rolls songs up per artist, counting distinct album names directly.
pub fn aggregate_artists(songs: &[SongRecord]) -> Vec<ArtistRecord> {
    let mut by_artist: BTreeMap<&str, ArtistTotals> = BTreeMap::new();

    for song in songs {
        let totals = by_artist.entry(song.artist.as_str()).or_default();
        totals.play_count = totals.play_count.saturating_add(song.plays);
        totals.minutes += song.minutes;
        totals.songs += 1;
        if let Some(album) = song.album.as_deref() {
            totals.albums.insert(album);
        }
    }

    let mut artists: Vec<ArtistRecord> = by_artist
        .into_iter()
        .map(|(artist, totals)| ArtistRecord {
            artist: artist.to_string(),
            plays: totals.play_count,
            minutes: round_to(totals.minutes, 1),
            songs: totals.songs,
            albums: totals.albums.len() as u64,
        })
        .collect();
    artists.sort_by(|a, b| b.plays.cmp(&a.plays));
    artists
}

/// Song records whose album or artist equals `name` exactly, most played
/// first.
pub fn detail(songs: &[SongRecord], kind: DetailKind, name: &str) -> Detail {
    let mut records: Vec<SongRecord> = songs
        .iter()
        .filter(|song| match kind {
            DetailKind::Album => song.album.as_deref() == Some(name),
            DetailKind::Artist => song.artist == name,
        })
        .cloned()
        .collect();
    records.sort_by(compare_plays_desc);

    let total_plays = records.iter().map(|song| song.plays).sum();
    let total_minutes = round_to(records.iter().map(|song| song.minutes).sum(), 1);
    let summary = DetailSummary {
        total_plays,
        total_minutes,
        song_count: records.len() as u64,
    };

    Detail {
        name: name.to_string(),
        kind,
        records,
        summary,
    }
}

fn compare_plays_desc(a: &SongRecord, b: &SongRecord) -> Ordering {
    b.plays.cmp(&a.plays)
}

/// Keeps records whose text columns contain every token of `query`,
/// ignoring case and diacritics.
pub fn search(records: &[Record], query: &str) -> Vec<Record> {
    let tokens: Vec<String> = query.split_whitespace().map(fold_text).collect();
    if tokens.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| {
            let haystack = fold_text(&record_text(record));
            tokens.iter().all(|token| haystack.contains(token.as_str()))
        })
        .cloned()
        .collect()
}

fn record_text(record: &Record) -> String {
    match record {
        Record::Song(song) => format!(
            "{} {} {}",
            song.song,
            song.artist,
            song.album.as_deref().unwrap_or_default()
        ),
        Record::Album(album) => format!("{} {}", album.album, album.artist),
        Record::Artist(artist) => artist.artist.clone(),
    }
}

pub(crate) fn fold_text(text: &str) -> String {
    text.nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Event;

    fn play(track: &str, artist: &str, album: Option<&str>, ms: u64) -> Event {
        Event {
            track: Some(track.to_string()),
            artist: Some(artist.to_string()),
            album: album.map(str::to_string),
            ms_played: Some(ms),
            ..Event::default()
        }
    }

    fn dataset(events: Vec<Event>) -> Dataset {
        let mut files = BTreeMap::new();
        files.insert(String::from("history.json"), events);
        Dataset::from_files(files)
    }

    fn song(name: &str, artist: &str, album: Option<&str>, plays: u64, minutes: f64) -> SongRecord {
        SongRecord {
            song: name.to_string(),
            artist: artist.to_string(),
            album: album.map(str::to_string),
            plays,
            minutes,
        }
    }

    #[test]
    fn songs_sum_plays_and_minutes_per_key() {
        let songs = aggregate_songs(&dataset(vec![
            play("A", "X", Some("One"), 60_000),
            play("A", "X", Some("One"), 30_000),
            play("B", "X", Some("One"), 600_000),
        ]));

        assert_eq!(songs.len(), 2);
        assert_eq!((songs[0].song.as_str(), songs[0].plays), ("A", 2));
        assert_eq!(songs[0].minutes, 1.5);
        assert_eq!((songs[1].song.as_str(), songs[1].plays), ("B", 1));
        assert_eq!(songs[1].minutes, 10.0);

        let artists = aggregate_artists(&songs);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].plays, 3);
        assert_eq!(artists[0].minutes, 11.5);
        assert_eq!(artists[0].songs, 2);
    }

    #[test]
    fn events_missing_required_fields_are_skipped() {
        let mut no_artist = play("A", "X", None, 1_000);
        no_artist.artist = None;
        let mut no_ms = play("A", "X", None, 1_000);
        no_ms.ms_played = None;

        let songs = aggregate_songs(&dataset(vec![no_artist, no_ms, play("A", "X", None, 1_000)]));
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].plays, 1);
    }

    #[test]
    fn first_seen_album_wins() {
        let songs = aggregate_songs(&dataset(vec![
            play("A", "X", Some("Single"), 1_000),
            play("A", "X", Some("Deluxe"), 1_000),
        ]));
        assert_eq!(songs[0].album.as_deref(), Some("Single"));
    }

    #[test]
    fn empty_dataset_yields_no_songs() {
        assert!(aggregate_songs(&Dataset::default()).is_empty());
    }

    #[test]
    fn derived_levels_rerround_song_minutes() {
        let songs = vec![
            song("A", "X", Some("One"), 1, 0.25),
            song("B", "X", Some("Two"), 1, 0.25),
            song("C", "X", Some("Two"), 1, 0.5),
        ];
        let albums = aggregate_albums(&songs);
        let minutes: Vec<(&str, f64)> = albums
            .iter()
            .map(|album| (album.album.as_str(), album.minutes))
            .collect();
        assert_eq!(minutes, vec![("Two", 0.8), ("One", 0.2)]);

        let artists = aggregate_artists(&songs);
        assert_eq!(artists[0].minutes, 1.0);
    }

    #[test]
    fn song_minutes_round_the_stored_value() {
        let songs = aggregate_songs(&dataset(vec![
            play("A", "X", None, 300),
            play("B", "X", None, 900),
            play("C", "X", None, 1_500),
        ]));
        let minutes: Vec<f64> = songs.iter().map(|song| song.minutes).collect();
        assert_eq!(minutes, vec![0.01, 0.01, 0.03]);
    }

    #[test]
    fn album_minutes_round_the_stored_sum() {
        let songs = vec![
            song("A", "X", Some("One"), 1, 0.2),
            song("B", "X", Some("One"), 1, 0.15),
        ];
        assert_eq!(aggregate_albums(&songs)[0].minutes, 0.3);
        assert_eq!(aggregate_artists(&songs)[0].minutes, 0.3);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert!(round_to(f64::NAN, 1).is_nan());
    }

    #[test]
    fn artist_album_count_uses_distinct_names() {
        let songs = vec![
            song("A", "X", Some("One"), 5, 1.0),
            song("B", "X", Some("Two"), 3, 1.0),
            song("C", "X", Some("One"), 2, 1.0),
            song("D", "X", None, 1, 1.0),
        ];

        let artists = aggregate_artists(&songs);
        assert_eq!(artists[0].songs, 4);
        assert_eq!(artists[0].albums, 2);

        let albums = aggregate_albums(&songs);
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].album, "One");
        assert_eq!(albums[0].plays, 7);
        assert_eq!(albums[0].songs, 2);
    }

    #[test]
    fn derived_sort_keeps_grouping_order_on_ties() {
        let songs = vec![
            song("A", "Zed", Some("Z"), 4, 1.0),
            song("B", "Amy", Some("A"), 4, 1.0),
            song("C", "Max", Some("M"), 9, 1.0),
        ];

        let artists: Vec<String> = aggregate_artists(&songs)
            .into_iter()
            .map(|artist| artist.artist)
            .collect();
        assert_eq!(artists, vec!["Max", "Amy", "Zed"]);
    }

    #[test]
    fn detail_filters_by_exact_name_and_sums() {
        let songs = vec![
            song("A", "X", Some("One"), 2, 1.5),
            song("B", "X", Some("Two"), 1, 10.0),
            song("C", "Xavier", Some("One"), 7, 3.0),
        ];

        let by_artist = detail(&songs, DetailKind::Artist, "X");
        assert_eq!(by_artist.records.len(), 2);
        assert_eq!(by_artist.summary.total_plays, 3);
        assert_eq!(by_artist.summary.total_minutes, 11.5);
        assert_eq!(by_artist.summary.song_count, 2);

        let by_album = detail(&songs, DetailKind::Album, "One");
        assert_eq!(by_album.records[0].song, "C");
        assert_eq!(by_album.summary.total_plays, 9);

        let missing = detail(&songs, DetailKind::Album, "Nope");
        assert!(missing.records.is_empty());
        assert_eq!(missing.summary.total_plays, 0);
    }

    #[test]
    fn search_matches_all_tokens_ignoring_accents() {
        let records = vec![
            Record::Song(song("Café del Mar", "Energy 52", None, 1, 1.0)),
            Record::Song(song("Cafe Racer", "Nobody", None, 1, 1.0)),
        ];

        let hits = search(&records, "CAFE energy");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].as_song().map(|song| song.song.as_str()), Some("Café del Mar"));
        assert_eq!(search(&records, "   ").len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn plays_are_conserved_across_levels(
            plays in proptest::collection::vec((0u8..4, 0u8..3, 0u8..3, 0u64..400_000), 0..120)
        ) {
            let events: Vec<Event> = plays
                .iter()
                .map(|(track, artist, album, ms)| {
                    play(&format!("t{track}"), &format!("a{artist}"), Some(format!("al{album}").as_str()), *ms)
                })
                .collect();
            let songs = aggregate_songs(&dataset(events));

            for song in &songs {
                let expected = plays
                    .iter()
                    .filter(|(track, artist, _, _)| {
                        format!("t{track}") == song.song && format!("a{artist}") == song.artist
                    })
                    .count() as u64;
                proptest::prop_assert_eq!(song.plays, expected);
            }

            let song_total: u64 = songs.iter().map(|song| song.plays).sum();
            proptest::prop_assert_eq!(song_total, plays.len() as u64);

            for album in aggregate_albums(&songs) {
                let members: Vec<&SongRecord> = songs
                    .iter()
                    .filter(|song| song.album.as_deref() == Some(album.album.as_str()) && song.artist == album.artist)
                    .collect();
                proptest::prop_assert_eq!(album.plays, members.iter().map(|song| song.plays).sum::<u64>());
                proptest::prop_assert_eq!(album.songs, members.len() as u64);
                let minutes: f64 = members.iter().map(|song| song.minutes).sum();
                proptest::prop_assert_eq!(album.minutes, round_to(minutes, 1));
            }

            for artist in aggregate_artists(&songs) {
                let albums: BTreeSet<&str> = songs
                    .iter()
                    .filter(|song| song.artist == artist.artist)
                    .filter_map(|song| song.album.as_deref())
                    .collect();
                proptest::prop_assert_eq!(artist.albums, albums.len() as u64);
            }
        }
    }
}
