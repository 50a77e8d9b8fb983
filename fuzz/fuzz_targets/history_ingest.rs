#![no_main]

use libfuzzer_sys::fuzz_target;
use spinstats::SessionRegistry;
use spinstats::model::AggregationLevel;
use std::collections::BTreeMap;

fuzz_target!(|data: &[u8]| {
    let mut files = BTreeMap::new();
    files.insert(String::from("Streaming_History_Audio_fuzz.json"), data.to_vec());

    let registry = SessionRegistry::default();
    let Ok(session) = registry.load_bytes(files) else {
        return;
    };

    for level in AggregationLevel::ALL {
        let base = session.aggregation(level);
        let sorted = session.sorted(level, "Minutes Played", "desc");
        assert_eq!(base.len(), sorted.len());
    }
    let _ = session.monthly_top();
    let _ = session.overview();
});
