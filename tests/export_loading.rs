use spinstats::library::read_export_dir;
use spinstats::model::EngineSettings;
use spinstats::{EngineError, SessionRegistry};
use std::fs;
use tempfile::tempdir;

const EXTENDED: &str = r#"[
  {"ts": "2023-11-02T21:14:03Z", "platform": "android", "ms_played": 215000,
   "master_metadata_track_name": "Night Drive", "master_metadata_album_artist_name": "Neon",
   "master_metadata_album_album_name": "Skyline", "spotify_track_uri": "spotify:track:1"},
  {"ts": "2023-11-03T07:40:11Z", "platform": "android", "ms_played": 180000,
   "master_metadata_track_name": "Night Drive", "master_metadata_album_artist_name": "Neon",
   "master_metadata_album_album_name": "Skyline", "spotify_track_uri": "spotify:track:1"},
  {"ts": "2023-12-24T18:00:00Z", "platform": "ios", "ms_played": 30000,
   "master_metadata_track_name": null, "master_metadata_album_artist_name": null,
   "master_metadata_album_album_name": null, "episode_name": "Some Podcast"},
  {"ts": "2023-12-25T10:05:00Z", "platform": "ios", "ms_played": 240000,
   "master_metadata_track_name": "Ocean Room", "master_metadata_album_artist_name": "Blue",
   "master_metadata_album_album_name": "Harbor", "spotify_track_uri": "spotify:track:2"}
]"#;

#[test]
fn export_directory_loads_into_current_session() {
    let dir = tempdir().expect("tempdir");
    let nested = dir.path().join("Spotify Extended Streaming History");
    fs::create_dir_all(&nested).expect("mkdir");
    fs::write(nested.join("Streaming_History_Audio_2023.json"), EXTENDED).expect("write");
    fs::write(nested.join("ReadMeFirst_ExtendedStreamingHistory.pdf"), b"%PDF").expect("write");

    let settings = EngineSettings::default();
    let files = read_export_dir(dir.path(), &settings).expect("read");
    let registry = SessionRegistry::new(settings);
    let session = registry.load_bytes(files).expect("load");

    let overview = session.overview();
    assert_eq!(overview.files, 1);
    assert_eq!(overview.events, 4);
    assert_eq!(overview.valid_plays, 3);
    assert_eq!(overview.artists, 2);
    assert_eq!(overview.first_month.as_deref(), Some("2023-11"));
    assert_eq!(overview.last_month.as_deref(), Some("2023-12"));

    let top = registry.monthly_top().expect("monthly");
    assert_eq!(top.months.len(), 2);
    assert_eq!(top.months[0].song, "Ocean Room");
    assert_eq!(top.months[0].month_label(), "December 2023");
    assert_eq!(top.months[1].song, "Night Drive");
    assert_eq!(top.months[1].minutes_played, 6.6);

    let hits = registry.search("album", "skyline").expect("search");
    assert_eq!(hits.len(), 1);
}

#[test]
fn invalid_history_file_fails_the_load() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("Streaming_History_Audio_2023.json"), EXTENDED).expect("write");
    fs::write(dir.path().join("Streaming_History_Audio_2024.json"), b"{oops").expect("write");

    let settings = EngineSettings::default();
    let files = read_export_dir(dir.path(), &settings).expect("read");
    let registry = SessionRegistry::new(settings);

    let err = registry.load_bytes(files).expect_err("malformed");
    assert!(matches!(
        err,
        EngineError::MalformedInput { ref file, .. } if file == "Streaming_History_Audio_2024.json"
    ));
    assert!(registry.current().is_err());
}
