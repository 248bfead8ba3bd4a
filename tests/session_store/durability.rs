//! On-disk persistence across reopen

use crate::*;

#[test]
fn committed_sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.redb");

    {
        let db = SessionDb::open(&path).unwrap();
        db.create("s1", payload(json!({"count": 0})), None).unwrap();
        for _ in 0..5 {
            db.update("s1", increment).unwrap();
        }
        db.create("gone", Payload::new(), None).unwrap();
        db.delete("gone").unwrap();
        db.close();
    }

    let db = SessionDb::open(&path).unwrap();
    let record = db.get("s1").unwrap().unwrap();
    assert_eq!(record.version, 6);
    assert_eq!(count_of(&db, "s1"), 5);
    assert!(db.get("gone").unwrap().is_none());
    // Lock entries are not persisted
    assert!(db.locks().is_empty());
}

#[test]
fn aborted_batch_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.redb");

    {
        let db = SessionDb::open(&path).unwrap();
        db.create("a", payload(json!({"count": 0})), None).unwrap();
        let _ = db.batch_update(
            Batch::new()
                .update("a", increment)
                .update("a", |_| Err(Error::rejected("abort"))),
        );
    }

    let db = SessionDb::open(&path).unwrap();
    assert_eq!(count_of(&db, "a"), 0);
    assert_eq!(db.get("a").unwrap().unwrap().version, 1);
}

#[test]
fn config_file_opens_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("sessions.redb");
    let config_path = dir.path().join("sessiondb.toml");
    std::fs::write(
        &config_path,
        format!(
            "path = {:?}\ndurability = \"eventual\"\nsweep_interval_ms = 0\nmax_sessions = 5\n",
            db_path.display().to_string()
        ),
    )
    .unwrap();

    let config = StoreConfig::from_file(&config_path).unwrap();
    let db = SessionDb::from_config(config).unwrap();
    assert_eq!(db.path(), Some(db_path.as_path()));
    assert_eq!(db.durability_mode(), DurabilityMode::Eventual);
    assert!(!db.has_sweeper());
    db.create("s1", Payload::new(), None).unwrap();
    assert!(db_path.exists());
}
