use std::env;
use std::error::Error;

use tracing_subscriber::EnvFilter;
use tunematch::{EngineConfig, Matcher, TrackInfo, identify, index_track, synthetic_signatures};

const CATALOG_SIZE: u64 = 50;
const FINGERPRINTS_PER_TRACK: usize = 120;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match env::args().nth(1) {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let fingerprint_cfg = config.fingerprint_configuration();
    let query_cfg = config.query_configuration();

    let store = config.in_memory_store();
    for seed in 0..CATALOG_SIZE {
        let signatures =
            synthetic_signatures(seed, FINGERPRINTS_PER_TRACK, &fingerprint_cfg.hashing);
        let info = TrackInfo::new(
            format!("Artist {}", seed % 7),
            format!("Track {seed}"),
            fingerprint_cfg.end_at(FINGERPRINTS_PER_TRACK as u32 - 1),
        );
        index_track(&store, info, &signatures, &fingerprint_cfg)?;
    }

    // A ten-fingerprint snippet from the middle of one track, with one band
    // of every signature corrupted to simulate noise.
    let mut snippet: Vec<Vec<u8>> =
        synthetic_signatures(17, FINGERPRINTS_PER_TRACK, &fingerprint_cfg.hashing)[40..50]
            .to_vec();
    for signature in &mut snippet {
        signature[0] ^= 0xFF;
    }

    let matcher = Matcher::new(store);
    let result = identify(&matcher, &snippet, &query_cfg)?;

    match result.best_match() {
        Some(best) => println!(
            "Best match: {} - {} (confidence {:.2}, coverage {:.2}, track offset {:.2}s)",
            best.track.info.artist,
            best.track.info.title,
            best.confidence,
            best.coverage,
            best.track_match_starts_at,
        ),
        None => println!("No match"),
    }
    println!(
        "{} candidate tracks analyzed, {} results returned",
        result.tracks_analyzed(),
        result.entries().len()
    );

    Ok(())
}
