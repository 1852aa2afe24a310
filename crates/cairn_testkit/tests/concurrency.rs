//! Storage operations racing each other across threads.

use cairn_core::{ALL_SEGMENTS, DEFAULT, MARKET_DATA};
use cairn_lsm_plugin::{LsmColumnarKeyValueStorage, LsmConfiguration, LsmFactoryConfiguration};
use cairn_plugin_api::{
    DataStorageFormat, SegmentedKeyValueStorage, SnappableKeyValueStorage, StorageError,
};
use cairn_testkit::{keys_of, put_all, TestStorage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const PROMPT: Duration = Duration::from_millis(500);

#[test]
fn try_delete_gives_up_while_another_thread_holds_the_key() {
    let fixture = TestStorage::archive();
    let storage = Arc::clone(&fixture.storage);
    put_all(&*storage, &MARKET_DATA, &[(b"k", b"v")]);

    let held = Barrier::new(2);
    let release = Barrier::new(2);
    thread::scope(|scope| {
        scope.spawn(|| {
            let mut txn = storage.start_transaction().unwrap();
            txn.put(&MARKET_DATA, b"k", b"held").unwrap();
            held.wait();
            release.wait();
            txn.commit().unwrap();
        });

        held.wait();
        let started = Instant::now();
        let deleted = storage.try_delete(&MARKET_DATA, b"k");
        let elapsed = started.elapsed();
        release.wait();

        assert!(!deleted.unwrap());
        assert!(elapsed < PROMPT, "{elapsed:?}");
    });

    assert_eq!(
        storage.get(&MARKET_DATA, b"k").unwrap(),
        Some(b"held".to_vec())
    );
    assert!(storage.try_delete(&MARKET_DATA, b"k").unwrap());
    assert_eq!(storage.get(&MARKET_DATA, b"k").unwrap(), None);
}

#[test]
fn try_delete_never_waits_on_a_busy_commit_path() {
    for format in DataStorageFormat::ALL {
        let fixture = TestStorage::open(format);
        let storage = Arc::clone(&fixture.storage);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                let mut round = 0u32;
                while !done.load(Ordering::Acquire) {
                    let key = round.to_be_bytes();
                    put_all(&*storage, &MARKET_DATA, &[(&key, b"v")]);
                    round = round.wrapping_add(1);
                }
            });

            let mut slowest = Duration::ZERO;
            let outcomes: Vec<_> = (0..200u32)
                .map(|round| {
                    let key = [b"gone-".as_slice(), &round.to_be_bytes()].concat();
                    let started = Instant::now();
                    let outcome = storage.try_delete(&MARKET_DATA, &key);
                    slowest = slowest.max(started.elapsed());
                    outcome
                })
                .collect();
            done.store(true, Ordering::Release);

            for outcome in outcomes {
                assert!(outcome.is_ok(), "{format}: {outcome:?}");
            }
            assert!(slowest < PROMPT, "{format}: {slowest:?}");
        });
    }
}

#[test]
fn snapshot_copies_and_close_keep_the_count_balanced() {
    let dir = tempdir().unwrap();
    let storage = LsmColumnarKeyValueStorage::open(
        LsmConfiguration::new(dir.path(), LsmFactoryConfiguration::default()),
        DataStorageFormat::Compact,
        &ALL_SEGMENTS,
        &[],
    )
    .unwrap();
    put_all(&storage, &MARKET_DATA, &[(b"a", b"1")]);

    let base = storage.take_snapshot().unwrap();
    let start = Barrier::new(4);
    thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(|| {
                start.wait();
                for _ in 0..100 {
                    match base.clone_snapshot() {
                        Ok(copy) => {
                            assert_eq!(
                                copy.get(&MARKET_DATA, b"a").unwrap(),
                                Some(b"1".to_vec())
                            );
                            copy.close().unwrap();
                        }
                        Err(err) => {
                            assert!(matches!(err, StorageError::IllegalState { .. }), "{err}");
                        }
                    }
                    let fresh = storage.take_snapshot().unwrap();
                    fresh.close().unwrap();
                }
            });
        }

        start.wait();
        thread::yield_now();
        base.close().unwrap();
    });

    assert!(base.clone_snapshot().is_err());
    assert_eq!(storage.engine().live_snapshots(), 0);
    storage.close().unwrap();
}

#[test]
fn clear_runs_alongside_a_writer() {
    for format in DataStorageFormat::ALL {
        let fixture = TestStorage::open(format);
        let storage = Arc::clone(&fixture.storage);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                let mut round = 0u32;
                while !done.load(Ordering::Acquire) {
                    let key = round.to_be_bytes();
                    let mut txn = storage.start_transaction().unwrap();
                    txn.put(&DEFAULT, &key, b"v").unwrap();
                    txn.put(&MARKET_DATA, &key, b"v").unwrap();
                    txn.commit().unwrap();
                    round = round.wrapping_add(1);
                }
            });

            let mut slowest = Duration::ZERO;
            let outcomes: Vec<_> = (0..20)
                .map(|_| {
                    let started = Instant::now();
                    let outcome = storage
                        .clear(&DEFAULT)
                        .and_then(|()| storage.clear(&MARKET_DATA));
                    slowest = slowest.max(started.elapsed());
                    outcome
                })
                .collect();
            done.store(true, Ordering::Release);

            for outcome in outcomes {
                assert!(outcome.is_ok(), "{format}: {outcome:?}");
            }
            assert!(slowest < PROMPT, "{format}: {slowest:?}");
        });

        storage.clear(&DEFAULT).unwrap();
        storage.clear(&MARKET_DATA).unwrap();
        assert!(keys_of(&*storage, &DEFAULT).is_empty(), "{format}");
        assert!(keys_of(&*storage, &MARKET_DATA).is_empty(), "{format}");

        put_all(&*storage, &DEFAULT, &[(b"after", b"1")]);
        assert_eq!(keys_of(&*storage, &DEFAULT), vec![b"after".to_vec()]);
    }
}
