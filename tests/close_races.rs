//! Scenario S6 — concurrent `store` calls racing a `close()`: every call
//! must either succeed or fail with a closed error, never panic, and any
//! store acknowledged before `close()` returns must be durable afterward.

use helios::{CasConfig, CasError, CasStore, HotCache, L1Config, ObjectStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_stores_survive_a_racing_close() {
    let store_dir = tempfile::tempdir().unwrap();
    let l2 = Arc::new(ObjectStore::open(&store_dir.path().join("objects")).unwrap());
    let l1 = Arc::new(HotCache::new(L1Config::default()));
    let cas = Arc::new(CasStore::new(l1, Some(Arc::clone(&l2)), CasConfig::default()));

    const THREADS: usize = 100;
    const STORES_PER_THREAD: usize = 10;

    let start = Arc::new(Barrier::new(THREADS + 1));
    let acknowledged: Arc<std::sync::Mutex<Vec<helios::Hash>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));
    let panicked = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(THREADS);
    for t in 0..THREADS {
        let cas = Arc::clone(&cas);
        let start = Arc::clone(&start);
        let acknowledged = Arc::clone(&acknowledged);
        let panicked = Arc::clone(&panicked);

        handles.push(thread::spawn(move || {
            start.wait();
            for i in 0..STORES_PER_THREAD {
                let payload = format!("thread-{t}-store-{i}");
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    cas.store(payload.as_bytes())
                })) {
                    Ok(Ok(hash)) => acknowledged.lock().unwrap().push(hash),
                    Ok(Err(CasError::Closed)) => {}
                    Ok(Err(other)) => panic!("unexpected store error: {other}"),
                    Err(_) => {
                        panicked.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }));
    }

    let closer_cas = Arc::clone(&cas);
    let closer_start = Arc::clone(&start);
    let closer = thread::spawn(move || {
        closer_start.wait();
        thread::sleep(Duration::from_millis(10));
        closer_cas.close();
    });

    start.wait();
    for h in handles {
        h.join().unwrap();
    }
    closer.join().unwrap();

    assert_eq!(panicked.load(Ordering::SeqCst), 0, "no store call may panic");
    assert!(cas.is_closed());

    for hash in acknowledged.lock().unwrap().iter() {
        assert!(
            l2.contains_hash(hash).unwrap(),
            "every acknowledged store must be durable after close() returns"
        );
    }
}
