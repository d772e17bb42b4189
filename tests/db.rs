use std::path::Path;

use peach::error::Error;
use peach::options::Options;
use peach::DB;
use rand::RngCore;

fn rand_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

fn open_at(path: &Path) -> DB {
    DB::new(Options::default_at(path)).unwrap()
}

/// S1. Basic round-trip: put a corpus of random keys, sync, read it all
/// back, close and reopen, read it all back again.
#[test]
fn basic_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<Vec<u8>> = (0..1024).map(|_| rand_bytes(36)).collect();

    {
        let db = open_at(dir.path());
        for key in &keys {
            db.put(key, key).unwrap();
        }
        db.sync().unwrap();
        for key in &keys {
            assert_eq!(db.get(key).unwrap(), *key);
        }
        db.close().unwrap();
    }

    let db = open_at(dir.path());
    for key in &keys {
        assert_eq!(db.get(key).unwrap(), *key);
    }
    db.close().unwrap();
}

/// S2. Delete persistence: deletions survive a close/reopen cycle and
/// `size()` reflects only the surviving keys.
#[test]
fn delete_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<Vec<u8>> = (0..1024).map(|_| rand_bytes(36)).collect();

    {
        let db = open_at(dir.path());
        for key in &keys {
            db.put(key, key).unwrap();
        }
        for key in &keys[..512] {
            db.delete(key).unwrap();
        }
        assert_eq!(db.size(), 512);
        db.close().unwrap();
    }

    let db = open_at(dir.path());
    assert_eq!(db.size(), 512);
    for key in &keys[..512] {
        assert_eq!(db.get(key), Err(Error::KeyNotFound));
    }
    for key in &keys[512..] {
        assert_eq!(db.get(key).unwrap(), *key);
    }
    db.close().unwrap();
}

/// S3. Rotation: a low size threshold forces multiple segment files, and
/// every key remains reachable regardless of which file it landed in.
#[test]
fn rotation_keeps_all_keys_reachable() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = Options::default_at(dir.path());
    opts.log_file_size_threshold = 10 * 1024;

    let db = DB::new(opts).unwrap();
    let keys: Vec<Vec<u8>> = (0..10_000).map(|_| rand_bytes(36)).collect();
    for key in &keys {
        db.put(key, key).unwrap();
    }
    for key in &keys {
        assert_eq!(db.get(key).unwrap(), *key);
    }
    db.close().unwrap();
}

/// S4. Compaction: after deleting half a rotated store's keys and forcing
/// a full compaction, exactly one log file remains and surviving keys are
/// intact.
#[test]
fn compaction_collapses_to_one_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = Options::default_at(dir.path());
    opts.log_file_size_threshold = 10 * 1024;

    let db = DB::new(opts).unwrap();
    let mut keys: Vec<Vec<u8>> = (0..2_000).map(|_| rand_bytes(36)).collect();
    for key in &keys {
        db.put(key, key).unwrap();
    }

    use rand::seq::SliceRandom;
    keys.shuffle(&mut rand::thread_rng());
    let (to_delete, surviving) = keys.split_at(1_000);
    for key in to_delete {
        db.delete(key).unwrap();
    }
    assert_eq!(db.size(), 1_000);

    db.compact().unwrap();

    let log_files = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("log."))
        .count();
    assert_eq!(log_files, 1);

    for key in surviving {
        assert_eq!(db.get(key).unwrap(), *key);
    }
    for key in to_delete {
        assert_eq!(db.get(key), Err(Error::KeyNotFound));
    }
    db.close().unwrap();
}

/// S7. Directory lock contention: a second `DB::new` on an already-open
/// directory fails, and a later open succeeds once the first is closed.
#[test]
fn second_open_on_locked_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let first = open_at(dir.path());

    let second = DB::new(Options::default_at(dir.path()));
    assert!(matches!(second, Err(Error::Lock(_))));

    first.close().unwrap();
    let third = DB::new(Options::default_at(dir.path()));
    assert!(third.is_ok());
    third.unwrap().close().unwrap();
}

/// S8. Config loading: a TOML override layers over the compiled-in
/// defaults and is picked up by `Options::load`.
#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("peach.toml");
    std::fs::write(&config_path, "log_file_size_threshold = 1048576\n").unwrap();

    let opts = Options::load(&config_path, Some(dir.path())).unwrap();
    assert_eq!(opts.log_file_size_threshold, 1_048_576);
    assert_ne!(opts.log_file_size_threshold, Options::default_at(dir.path()).log_file_size_threshold);
}

/// S5-style corpus: UUID-derived keys (rather than plain random bytes)
/// round-trip and reload correctly, and the live set matches what was put.
#[test]
fn uuid_keyed_entries_round_trip_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<[u8; 16]> = (0..256).map(|_| *uuid::Uuid::new_v4().as_bytes()).collect();

    {
        let db = open_at(dir.path());
        for key in &keys {
            db.put(key, key).unwrap();
        }
        assert_eq!(db.size(), keys.len() as i64);
        db.close().unwrap();
    }

    let db = open_at(dir.path());
    for key in &keys {
        assert_eq!(db.get(key).unwrap(), key.to_vec());
    }
    db.close().unwrap();
}

/// Keys absent from a fresh store are reported as `KeyNotFound`, not a
/// generic I/O error.
#[test]
fn missing_key_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_at(dir.path());
    assert_eq!(db.get(b"missing"), Err(Error::KeyNotFound));
    db.close().unwrap();
}

/// An overwritten key keeps `size()` unchanged and reads back the latest
/// value.
#[test]
fn overwrite_does_not_change_size() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_at(dir.path());
    db.put(b"k", b"v1").unwrap();
    assert_eq!(db.size(), 1);
    db.put(b"k", b"v2").unwrap();
    assert_eq!(db.size(), 1);
    assert_eq!(db.get(b"k").unwrap(), b"v2");
    db.close().unwrap();
}
