//! Test Helper Utilities
//!
//! Temporary stores, replay files, and telemetry fixtures shared by the
//! rtag-ingest integration tests.

#![allow(dead_code)]

use rtag_ingest::archive::hash_reader;
use rtag_ingest::telemetry::{
    GameTelemetry, Participant, Point, StaticTelemetrySource, TelemetryTeam, Unit, UnitType,
};
use rtag_ingest::{ReplayManager, ReplayProcessor, ReplayStore};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a store in a fresh temporary root folder
///
/// Returns (TempDir, ReplayStore) - TempDir must be kept alive for duration of test
pub async fn create_test_store() -> (TempDir, ReplayStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = ReplayStore::open(&temp_dir.path().join("root"), "SC2Replay")
        .await
        .unwrap();
    (temp_dir, store)
}

/// Create a manager whose telemetry comes from `source`
pub async fn create_test_manager(source: Arc<StaticTelemetrySource>) -> (TempDir, ReplayManager) {
    let (temp_dir, store) = create_test_store().await;
    let manager = ReplayManager::new(store, ReplayProcessor::new(source));
    (temp_dir, manager)
}

/// Write replay bytes outside the archive, returning (path, digest)
pub fn write_replay(dir: &Path, name: &str, bytes: &[u8]) -> (PathBuf, String) {
    let uploads = dir.join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let path = uploads.join(name);
    std::fs::write(&path, bytes).unwrap();
    let digest = hash_reader(&mut Cursor::new(bytes)).unwrap();
    (path, digest)
}

pub fn building(name: &str, started_at: u32, x: f64, y: f64) -> Unit {
    Unit {
        type_history: vec![UnitType {
            frame: started_at,
            name: name.to_string(),
        }],
        started_at,
        location: Some(Point::new(x, y)),
        is_building: true,
        is_army: false,
        supply: 0.0,
    }
}

pub fn participant(handle: &str, race: &str, result: &str, units: Vec<Unit>) -> Participant {
    Participant {
        handle: handle.to_string(),
        name: format!("{}-name", handle),
        pick_race: Some(race.to_string()),
        play_race: Some(race.to_string()),
        is_human: true,
        result: Some(result.to_string()),
        units,
    }
}

/// Two single-player teams, mains at (0,0) and (100,0)
pub fn one_v_one(first: (&str, &str, &str), second: (&str, &str, &str), timestamp: i64) -> GameTelemetry {
    let main = |race: &str| match race {
        "Protoss" => "Nexus",
        "Terran" => "CommandCenter",
        _ => "Hatchery",
    };

    GameTelemetry {
        teams: vec![
            TelemetryTeam {
                players: vec![participant(
                    first.0,
                    first.1,
                    first.2,
                    vec![building(main(first.1), 0, 0.0, 0.0)],
                )],
            },
            TelemetryTeam {
                players: vec![participant(
                    second.0,
                    second.1,
                    second.2,
                    vec![building(main(second.1), 0, 100.0, 0.0)],
                )],
            },
        ],
        unix_timestamp: timestamp,
        game_type: Some("1v1".to_string()),
        map_name: Some("Ever Dream LE".to_string()),
    }
}
