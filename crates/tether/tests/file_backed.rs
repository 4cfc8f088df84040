//! Persistence across engine lifetimes through a JSON file.

use serde_json::{Value as Json, json};
use tempfile::TempDir;
use tether::adapters::{FileStorage, WriteMode};
use tether::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn state_survives_a_restart() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("settings.json");

    {
        let file = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        let engine = Engine::new();
        let layout = Observable::named("layout", Json::Null);
        let _binding = engine
            .persist(PersistConfig::<Json>::new().adapter(file.adapter()).store(layout.clone()))
            .expect("valid config");
        layout.set(json!({ "columns": 3, "sidebar": true }));
    }

    let file = FileStorage::open(&path, WriteMode::Immediate).expect("reopen");
    let engine = Engine::new();
    let layout = Observable::new(Json::Null);
    let _binding = engine
        .persist(PersistConfig::<Json>::new().adapter(file.adapter()).store(layout.clone()).key("layout"))
        .expect("valid config");
    assert_eq!(layout.get(), json!({ "columns": 3, "sidebar": true }));
}

#[test]
fn storage_ops_remove_clears_the_file_entry() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state.json");
    let file = FileStorage::open(&path, WriteMode::Immediate).expect("open");
    let engine = Engine::new();
    let ops = engine
        .create_storage(PersistConfig::<Json>::new().adapter(file.adapter()).key("session"))
        .expect("valid config");

    assert!(matches!(ops.set(json!("abc"), None).into_ready(), Some(Ok(()))));
    assert_eq!(file.keys(), vec!["session".to_string()]);
    assert!(matches!(ops.remove(None).into_ready(), Some(Ok(()))));
    assert!(file.keys().is_empty());
    assert_eq!(ops.cached(), None);
}

#[test]
fn same_path_shares_one_area() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("shared.json");
    let first = FileStorage::open(&path, WriteMode::Buffered).expect("open");
    let second = FileStorage::open(&path, WriteMode::Buffered).expect("open");
    assert_eq!(first.key_area(), second.key_area());

    let engine = Engine::new();
    let a = Observable::new(0);
    let b = Observable::new(0);
    let _one = engine
        .persist(PersistConfig::<i32>::new().adapter(first.adapter()).store(a.clone()).key("n"))
        .expect("valid config");
    let _two = engine
        .persist(PersistConfig::<i32>::new().adapter(second.adapter()).store(b.clone()).key("n"))
        .expect("valid config");
    a.set(12);
    assert_eq!(b.get(), 12);
}
