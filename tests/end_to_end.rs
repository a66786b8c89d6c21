//! Black-box scenarios exercised against the public `StateManager` API,
//! with L1 and L2 both attached, rather than the in-process engine
//! internals exercised by the unit tests under `src/`.

use helios::{DiffStats, EngineConfig, MatOpts, StateManager};

fn attached_engine(dir: &std::path::Path) -> helios::Engine {
    let mut engine = helios::Engine::new(EngineConfig::default());
    engine.attach_stores(dir).expect("attach_stores");
    engine
}

#[test]
fn determinism_survives_a_restart_through_l2() {
    let store_dir = tempfile::tempdir().unwrap();

    let id1 = {
        let engine = attached_engine(store_dir.path());
        engine.write_file("a.txt", b"A").unwrap();
        engine.write_file("b.txt", b"B").unwrap();
        engine.commit("first").unwrap().0
    };

    let id2 = {
        // A fresh engine instance, same on-disk store: order of writes
        // reversed, content identical.
        let engine = attached_engine(store_dir.path());
        engine.write_file("b.txt", b"B").unwrap();
        engine.write_file("a.txt", b"A").unwrap();
        engine.commit("second").unwrap().0
    };

    assert_eq!(id1, id2);
}

#[test]
fn restore_across_engines_reads_back_original_bytes() {
    let store_dir = tempfile::tempdir().unwrap();

    let id = {
        let writer = attached_engine(store_dir.path());
        writer.write_file("notes/plan.md", b"draft one").unwrap();
        writer.write_file("notes/todo.md", b"- ship it").unwrap();
        writer.commit("plan").unwrap().0
    };

    let reader = attached_engine(store_dir.path());
    reader.restore(&id).unwrap();
    assert_eq!(
        reader.read_file("notes/plan.md").unwrap(),
        Some(b"draft one".to_vec())
    );
    assert_eq!(
        reader.read_file("notes/todo.md").unwrap(),
        Some(b"- ship it".to_vec())
    );
    assert_eq!(reader.read_file("notes/missing.md").unwrap(), None);
}

#[test]
fn diff_counts_added_changed_and_deleted() {
    let engine = attached_engine(tempfile::tempdir().unwrap().path());
    engine.write_file("keep.txt", b"same").unwrap();
    engine.write_file("change.txt", b"before").unwrap();
    engine.write_file("remove.txt", b"gone soon").unwrap();
    let (from, _) = engine.commit("base").unwrap();

    engine.delete_file("remove.txt").unwrap();
    engine.write_file("change.txt", b"after").unwrap();
    engine.write_file("new.txt", b"brand new").unwrap();
    let (to, _) = engine.commit("next").unwrap();

    let stats = engine.diff(&from, &to).unwrap();
    assert_eq!(
        stats,
        DiffStats {
            added: 1,
            changed: 1,
            deleted: 1,
        }
    );
}

#[test]
fn materialize_respects_include_and_exclude_end_to_end() {
    let engine = attached_engine(tempfile::tempdir().unwrap().path());
    engine.write_file("src/a.go", b"package main").unwrap();
    engine.write_file("src/b.go", b"package main").unwrap();
    engine.write_file("docs/readme.md", b"# hi").unwrap();
    let (id, _) = engine.commit("first").unwrap();

    let out = tempfile::tempdir().unwrap();
    let metrics = engine
        .materialize(&id, out.path(), &MatOpts::new().with_include(["src/**"]))
        .unwrap();
    assert_eq!(metrics.new_objects, 2);
    assert!(!out.path().join("docs").exists());
}

#[test]
fn large_working_set_commits_and_diffs_correctly() {
    let engine = attached_engine(tempfile::tempdir().unwrap().path());
    for i in 0..200 {
        engine
            .write_file(&format!("dir/{i}.txt"), format!("initial_{i}").as_bytes())
            .unwrap();
    }
    let (id1, metrics1) = engine.commit("bulk").unwrap();
    assert_eq!(metrics1.new_objects, 200);

    for i in (0..200).step_by(10) {
        engine
            .write_file(&format!("dir/{i}.txt"), format!("modified_{i}").as_bytes())
            .unwrap();
    }
    let (id2, _) = engine.commit("bulk-update").unwrap();

    assert_ne!(id1, id2);
    assert_eq!(engine.diff(&id1, &id2).unwrap().changed, 20);
}
