//! Create, delete, and the lock forget protocol

use crate::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn delete_removes_record_and_lock() {
    let db = create_db();
    db.create("s1", payload(json!({"count": 1})), None).unwrap();
    db.update("s1", increment).unwrap();
    assert!(db.locks().contains("s1"));

    db.delete("s1").unwrap();
    assert!(db.get("s1").unwrap().is_none());
    assert!(!db.locks().contains("s1"));
    assert!(db.delete("s1").unwrap_err().is_not_found());
}

#[test]
fn create_twice_is_already_exists() {
    let db = create_db();
    db.create("s1", Payload::new(), None).unwrap();
    let err = db.create("s1", Payload::new(), None).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    assert!(err.is_expected());
}

#[test]
fn concurrent_create_has_exactly_one_winner() {
    let db = Arc::new(create_db());
    let barrier = Arc::new(Barrier::new(16));
    let created = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            let created = Arc::clone(&created);
            let rejected = Arc::clone(&rejected);
            thread::spawn(move || {
                barrier.wait();
                match db.create("same-id", payload(json!({"owner": i})), None) {
                    Ok(_) => created.fetch_add(1, Ordering::SeqCst),
                    Err(Error::AlreadyExists { .. }) => rejected.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected: {e}"),
                };
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 15);
}

#[test]
fn delete_racing_updates_never_resurrects() {
    let db = Arc::new(create_db());
    db.create("doomed", payload(json!({"count": 0})), None).unwrap();

    let updaters: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..50 {
                    match db.update("doomed", increment) {
                        Ok(_) => {}
                        Err(e) if e.is_not_found() => break,
                        Err(e) => panic!("unexpected: {e}"),
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    db.delete("doomed").unwrap();
    for h in updaters {
        h.join().unwrap();
    }

    assert!(db.get("doomed").unwrap().is_none());
    assert!(!db.locks().contains("doomed"));
}

#[test]
fn recreate_after_delete_starts_fresh() {
    let db = create_db();
    db.create("s1", payload(json!({"count": 9})), None).unwrap();
    db.update("s1", increment).unwrap();
    db.delete("s1").unwrap();

    let record = db.create("s1", Payload::new(), None).unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(count_of(&db, "s1"), 0);
}

#[test]
fn delete_many_locks_in_order_and_forgets() {
    let db = create_db();
    for key in ["a", "b", "c", "d"] {
        db.create(key, Payload::new(), None).unwrap();
    }

    assert_eq!(db.delete_many(["d", "b", "x"]).unwrap(), 2);
    let remaining: Vec<String> = db
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.key.into_string())
        .collect();
    assert_eq!(remaining, ["a", "c"]);
    assert!(!db.locks().contains("b"));
    assert!(!db.locks().contains("d"));
    assert!(!db.locks().contains("x"));
}

#[test]
fn capacity_limit_applies_to_create() {
    let db = SessionDb::builder().no_sweeper().max_sessions(2).open().unwrap();
    db.create("a", Payload::new(), None).unwrap();
    db.create("b", Payload::new(), None).unwrap();
    assert!(matches!(
        db.create("c", Payload::new(), None),
        Err(Error::CapacityExceeded { limit: 2 })
    ));
}

#[test]
fn closed_database_refuses_everything() {
    let db = create_db();
    db.create("s1", Payload::new(), None).unwrap();
    db.close();

    assert!(matches!(db.get("s1"), Err(Error::Closed)));
    assert!(matches!(db.list(), Err(Error::Closed)));
    assert!(matches!(db.update("s1", increment), Err(Error::Closed)));
    assert!(matches!(
        db.create("s2", Payload::new(), None),
        Err(Error::Closed)
    ));
    assert!(matches!(db.delete("s1"), Err(Error::Closed)));
}

#[test]
fn evicting_cap_holds_under_concurrent_creates() {
    let db = Arc::new(
        SessionDb::builder()
            .no_sweeper()
            .max_sessions_evicting(4)
            .open()
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    match db.create(&format!("t{}-{}", t, i), Payload::new(), None) {
                        Ok(_) => {}
                        // Another creator took the freed slot first
                        Err(Error::CapacityExceeded { limit: 4 }) => {}
                        Err(e) => panic!("unexpected: {e:?}"),
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = db.list().unwrap().len();
    assert!(stored <= 4 && stored > 0, "stored {stored}");
    assert!(db.locks().len() <= stored);
}

#[test]
fn labels_select_sessions() {
    let db = create_db();
    db.create("a", payload(json!({"labels": ["deploy"]})), None).unwrap();
    db.create("b", Payload::new(), None).unwrap();
    db.add_label("b", "deploy").unwrap();
    db.add_label("b", "canary").unwrap();

    let deploy: Vec<String> = db
        .sessions_with_label("deploy")
        .unwrap()
        .into_iter()
        .map(|r| r.key.to_string())
        .collect();
    assert_eq!(deploy, ["a", "b"]);
    assert_eq!(db.all_labels().unwrap(), ["canary", "deploy"]);

    let filter = SessionFilter::new().with_label("deploy").with_label("canary");
    let matched = db.list_filtered(&filter, chrono::Utc::now()).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].key.as_str(), "b");
}

#[test]
fn close_runs_a_final_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.redb");

    {
        let db = SessionDb::builder().path(&path).no_sweeper().open().unwrap();
        db.create("short", Payload::new(), Some(SHORT_TTL)).unwrap();
        db.create("long", Payload::new(), None).unwrap();
        settle();
        db.close();
    }

    let db = SessionDb::builder().path(&path).no_sweeper().open().unwrap();
    assert!(db.get("short").unwrap().is_none());
    assert!(db.get("long").unwrap().is_some());
}
