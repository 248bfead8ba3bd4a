//! Single-key read-modify-write

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn hundred_concurrent_increments_reach_hundred() {
    let db = Arc::new(create_db());
    db.create("counter", payload(json!({"count": 0})), None).unwrap();

    let barrier = Arc::new(Barrier::new(100));
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.update("counter", increment).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(count_of(&db, "counter"), 100);
    assert_eq!(db.get("counter").unwrap().unwrap().version, 101);
}

#[test]
fn concurrent_appends_keep_every_entry() {
    let db = Arc::new(create_db());
    db.create("log", payload(json!({"steps": []})), None).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for step in 0..10 {
                    db.update("log", |p| {
                        let mut steps = coerce::field_strings(p, "steps");
                        steps.push(format!("{worker}-{step}"));
                        p.insert("steps".into(), json!(steps));
                        Ok(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let record = db.get("log").unwrap().unwrap();
    let steps = coerce::field_strings(&record.payload, "steps");
    assert_eq!(steps.len(), 80);
}

#[test]
fn rejected_update_leaves_record_identical() {
    let db = create_db();
    let before = db
        .create("s1", payload(json!({"stage": "deploy", "count": 3})), None)
        .unwrap();

    let err = db
        .update("s1", |p| {
            p.insert("stage".into(), json!("rollback"));
            p.remove("count");
            Err(Error::rejected("deploy already finished"))
        })
        .unwrap_err();
    assert!(matches!(err, Error::MutationRejected { ref key, .. } if key == "s1"));
    assert!(err.is_expected());

    let after = db.get("s1").unwrap().unwrap();
    assert_eq!(after, before);
}

#[test]
fn independent_sessions_do_not_wait_on_each_other() {
    let db = SessionDb::builder()
        .no_sweeper()
        .lock_timeout(Duration::from_millis(50))
        .open()
        .unwrap();
    db.create("busy", Payload::new(), None).unwrap();
    db.create("free", payload(json!({"count": 0})), None).unwrap();

    let key = SessionKey::new("busy").unwrap();
    let held = db.locks().acquire(&key, db.default_deadline()).unwrap();

    db.update("free", increment).unwrap();
    assert_eq!(count_of(&db, "free"), 1);
    assert!(db.update("busy", increment).unwrap_err().is_timeout());

    drop(held);
    db.update("busy", increment).unwrap();
}

#[test]
fn explicit_deadline_bounds_the_wait() {
    let db = create_db();
    db.create("s1", Payload::new(), None).unwrap();

    let key = SessionKey::new("s1").unwrap();
    let _held = db.locks().acquire(&key, db.default_deadline()).unwrap();

    let err = db
        .update_with_deadline("s1", Deadline::after(Duration::from_millis(25)), increment)
        .unwrap_err();
    assert!(matches!(err, Error::LockTimeout { ref key, .. } if key == "s1"));
}

#[test]
fn upsert_creates_missing_session() {
    let db = create_db();
    assert!(db.update("new", increment).unwrap_err().is_not_found());

    let record = db.upsert("new", increment).unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(count_of(&db, "new"), 1);
}
