#![allow(dead_code)]
use std::fs;

use registry_core::{encode_story, Body, Star, StarClaim};
use registry_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

pub fn claim(address: &str, story: &str) -> Body {
    Body::Claim(StarClaim {
        address: address.to_string(),
        star: Star {
            declination: Some("68° 52' 56.9".to_string()),
            right_ascension: Some("16h 29m 1.0s".to_string()),
            magnitude: Some("4.2".to_string()),
            constellation: Some("Ursa Major".to_string()),
            story: encode_story(story),
            story_decoded: None,
        },
    })
}
