//! Expiry sweep, manual and background

use crate::*;
use chrono::Utc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[test]
fn sweep_removes_expired_sessions_and_locks() {
    let db = create_db();
    db.create("expiring", Payload::new(), Some(SHORT_TTL)).unwrap();
    db.create("durable", Payload::new(), None).unwrap();
    settle();

    // Expired but unswept sessions are still readable
    let stale = db.get("expiring").unwrap().unwrap();
    assert!(stale.is_expired(Utc::now()));

    let stats = db.stats(Utc::now()).unwrap();
    assert_eq!((stats.total, stats.active, stats.expired), (2, 1, 1));

    let report = db.sweep_expired(Utc::now()).unwrap();
    assert_eq!(report.removed, 1);
    assert!(db.get("expiring").unwrap().is_none());
    assert!(!db.locks().contains("expiring"));
    assert!(db.get("durable").unwrap().is_some());
}

#[test]
fn extended_session_survives_sweep() {
    let db = create_db();
    db.create("s1", Payload::new(), Some(SHORT_TTL)).unwrap();
    db.extend("s1", Some(Duration::from_secs(3600))).unwrap();
    settle();

    let report = db.sweep_expired(Utc::now()).unwrap();
    assert_eq!(report.examined, 0);
    assert!(db.get("s1").unwrap().is_some());
}

#[test]
fn update_racing_sweep_succeeds_or_is_not_found() {
    for _ in 0..20 {
        let db = Arc::new(create_db());
        db.create("race", payload(json!({"count": 0})), Some(SHORT_TTL))
            .unwrap();
        settle();

        let sweeper = {
            let db = Arc::clone(&db);
            thread::spawn(move || db.sweep_expired(Utc::now()).unwrap())
        };
        let outcome = db.update("race", increment);
        let report = sweeper.join().unwrap();

        match outcome {
            // Updated first; the sweep then deleted the still-expired record
            Ok(record) => assert_eq!(record.version, 2),
            Err(e) => assert!(e.is_not_found(), "unexpected: {e}"),
        }
        assert_eq!(report.removed, 1);
        assert!(db.get("race").unwrap().is_none());
        assert!(!db.locks().contains("race"));
    }
}

#[test]
fn background_sweeper_removes_within_interval() {
    let interval = Duration::from_millis(50);
    let db = SessionDb::builder().sweep_interval(interval).open().unwrap();
    assert!(db.has_sweeper());
    db.create("short", Payload::new(), Some(SHORT_TTL)).unwrap();

    let started = Instant::now();
    while db.contains("short").unwrap() {
        assert!(
            started.elapsed() < SHORT_TTL + interval * 20,
            "session outlived the sweep interval"
        );
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!db.locks().contains("short"));

    db.close();
    assert!(!db.has_sweeper());
}
