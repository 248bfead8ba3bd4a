//! Multi-session batch updates

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn set(field: &'static str, value: i64) -> impl FnOnce(&mut Payload) -> Result<()> {
    move |p| {
        p.insert(field.into(), json!(value));
        Ok(())
    }
}

#[test]
fn failing_mutation_leaves_every_key_unchanged() {
    let db = create_db();
    let a = db.create("a", payload(json!({"count": 1})), None).unwrap();
    let b = db.create("b", payload(json!({"count": 2})), None).unwrap();
    let c = db.create("c", payload(json!({"count": 3})), None).unwrap();

    let err = db
        .batch_update(
            Batch::new()
                .update("a", increment)
                .update("b", increment)
                .update("c", |_| Err(Error::rejected("budget exhausted"))),
        )
        .unwrap_err();
    assert!(matches!(err, Error::MutationRejected { ref key, .. } if key == "c"));

    assert_eq!(db.get("a").unwrap().unwrap(), a);
    assert_eq!(db.get("b").unwrap().unwrap(), b);
    assert_eq!(db.get("c").unwrap().unwrap(), c);
}

#[test]
fn opposite_batches_never_mix() {
    let db = Arc::new(create_db());
    db.create("a", Payload::new(), None).unwrap();
    db.create("b", Payload::new(), None).unwrap();

    for _ in 0..50 {
        let barrier = Arc::new(Barrier::new(2));
        let first = {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.batch_update(Batch::new().update("a", set("v", 1)).update("b", set("v", 2)))
                    .unwrap();
            })
        };
        let second = {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.batch_update(Batch::new().update("b", set("v", 3)).update("a", set("v", 4)))
                    .unwrap();
            })
        };
        first.join().unwrap();
        second.join().unwrap();

        let a = coerce::field_int(&db.get("a").unwrap().unwrap().payload, "v");
        let b = coerce::field_int(&db.get("b").unwrap().unwrap().payload, "v");
        assert!(
            (a, b) == (1, 2) || (a, b) == (4, 3),
            "mixed batch result: a={a} b={b}"
        );
    }
}

#[test]
fn overlapping_batches_all_complete() {
    let db = Arc::new(create_db());
    let keys = ["k0", "k1", "k2", "k3", "k4"];
    for key in keys {
        db.create(key, payload(json!({"count": 0})), None).unwrap();
    }

    let handles: Vec<_> = (0..10)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for round in 0..20 {
                    // Each batch touches three keys, in a thread-specific order
                    let mut batch = Batch::new();
                    for i in 0..3 {
                        batch = batch.update(keys[(t + round + i * 2) % keys.len()], increment);
                    }
                    db.batch_update(batch).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total: i64 = keys.iter().map(|k| count_of(&db, k)).sum();
    assert_eq!(total, 10 * 20 * 3);
    for key in keys {
        assert!(!db.locks().is_held(key));
    }
}

#[test]
fn batch_and_single_updates_interleave_safely() {
    let db = Arc::new(create_db());
    db.create("x", payload(json!({"count": 0})), None).unwrap();
    db.create("y", payload(json!({"count": 0})), None).unwrap();

    let batcher = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..50 {
                db.batch_update(Batch::new().update("y", increment).update("x", increment))
                    .unwrap();
            }
        })
    };
    let single = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..50 {
                db.update("x", increment).unwrap();
            }
        })
    };
    batcher.join().unwrap();
    single.join().unwrap();

    assert_eq!(count_of(&db, "x"), 100);
    assert_eq!(count_of(&db, "y"), 50);
}

#[test]
fn missing_session_aborts_batch() {
    let db = create_db();
    let a = db.create("a", payload(json!({"count": 0})), None).unwrap();

    let err = db
        .batch_update(Batch::new().update("a", increment).update("gone", increment))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(db.get("a").unwrap().unwrap(), a);
    assert!(!db.locks().contains("gone"));
}

#[test]
fn batches_over_absent_keys_leave_registry_bounded() {
    let db = create_db();
    db.create("a", payload(json!({"count": 0})), None).unwrap();

    for i in 0..50 {
        let first = format!("m{}-1", i);
        let second = format!("m{}-2", i);
        let err = db
            .batch_update(Batch::new().update(&first, increment).update(&second, increment))
            .unwrap_err();
        assert!(err.is_not_found());
    }
    for i in 0..50 {
        let absent = format!("z{}", i);
        let err = db
            .batch_update(
                Batch::new()
                    .update("a", |_| Err(Error::rejected("refused")))
                    .update(&absent, increment),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    assert_eq!(db.locks().len(), 1);
    assert_eq!(count_of(&db, "a"), 0);
}
