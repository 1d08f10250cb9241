//! # comprehensive storage tests
//!
//! why: verify backups are kept, replaced and recovered correctly
//! relations: tests task-storage crate together with task-core backups
//! what: in-memory and file stores, stale backups, crash recovery, edge cases

use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};
use task_core::{ActiveTask, Backup, Log, Phase, Status, Tag};
use task_storage::{BackupStore, FileBackupStore, InMemoryBackupStore};
use tempfile::tempdir;

fn task(id: &str) -> ActiveTask {
    ActiveTask::new(tag(id), phases())
}

fn tag(id: &str) -> Arc<Tag> {
    Arc::new(Tag::new(id, Utc::now(), None, false))
}

fn phases() -> Vec<Phase> {
    vec![
        Phase::new("go", "drive to the shelf", Duration::seconds(60)),
        Phase::new("grab", "pick the tote", Duration::seconds(15)),
        Phase::new("return", "drive back", Duration::seconds(60)),
    ]
}

// =============================================================================
// SECTION 1: IN-MEMORY STORE TESTS
// =============================================================================

mod in_memory {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = InMemoryBackupStore::new();
        assert!(store.load("missing").unwrap().is_none());
        assert!(store.task_ids().unwrap().is_empty());
    }

    #[test]
    fn newer_backup_replaces_older() {
        let mut store = InMemoryBackupStore::new();
        let mut task = task("t1");

        let first = task.backup().unwrap();
        let second = task.backup().unwrap();
        assert!(store.save("t1", &first).unwrap());
        assert!(store.save("t1", &second).unwrap());

        assert_eq!(store.load("t1").unwrap(), Some(second));
    }

    #[test]
    fn equal_sequence_is_stale() {
        let mut store = InMemoryBackupStore::new();
        store.save("t1", &Backup::new(4, "a")).unwrap();

        assert!(!store.save("t1", &Backup::new(4, "b")).unwrap());
        assert_eq!(store.load("t1").unwrap().unwrap().state(), "a");
    }

    #[test]
    fn ids_are_sorted_and_removable() {
        let mut store = InMemoryBackupStore::new();
        store.save("b", &Backup::new(1, "{}")).unwrap();
        store.save("a", &Backup::new(1, "{}")).unwrap();
        assert_eq!(store.task_ids().unwrap(), vec!["a", "b"]);

        store.remove("a").unwrap();
        assert_eq!(store.task_ids().unwrap(), vec!["b"]);

        store.clear().unwrap();
        assert!(store.task_ids().unwrap().is_empty());
    }
}

// =============================================================================
// SECTION 2: FILE STORE TESTS
// =============================================================================

mod file_store {
    use super::*;

    #[test]
    fn creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("fleet").join("backups");

        let store = FileBackupStore::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn stale_backup_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let mut store = FileBackupStore::new(dir.path()).unwrap();

        store.save("t1", &Backup::new(9, "fresh")).unwrap();
        assert!(!store.save("t1", &Backup::new(2, "stale")).unwrap());
        assert_eq!(store.load("t1").unwrap().unwrap().state(), "fresh");
    }

    #[test]
    fn remove_missing_task_is_ok() {
        let dir = tempdir().unwrap();
        let mut store = FileBackupStore::new(dir.path()).unwrap();
        store.remove("never-saved").unwrap();
    }

    #[test]
    fn lists_only_backup_files() {
        let dir = tempdir().unwrap();
        let mut store = FileBackupStore::new(dir.path()).unwrap();

        store.save("delivery-2", &Backup::new(1, "{}")).unwrap();
        store.save("delivery-1", &Backup::new(1, "{}")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a backup").unwrap();

        assert_eq!(store.task_ids().unwrap(), vec!["delivery-1", "delivery-2"]);

        store.clear().unwrap();
        assert!(store.task_ids().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn corrupted_file_is_invalid_data() {
        let dir = tempdir().unwrap();
        let store = FileBackupStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("t1.json"), "{ not json").unwrap();

        let err = store.load("t1").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn renamed_file_is_detected() {
        let dir = tempdir().unwrap();
        let mut store = FileBackupStore::new(dir.path()).unwrap();
        store.save("t1", &Backup::new(1, "{}")).unwrap();
        fs::rename(dir.path().join("t1.json"), dir.path().join("t2.json")).unwrap();

        let err = store.load("t2").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_unusable_ids() {
        let dir = tempdir().unwrap();
        let store = FileBackupStore::new(dir.path()).unwrap();

        for id in ["", ".", "..", "a/b", "a\\b"] {
            let err = store.load(id).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput, "id {id:?}");
        }
    }
}

// =============================================================================
// SECTION 3: CRASH RECOVERY TESTS
// =============================================================================

mod crash_recovery {
    use super::*;

    #[test]
    fn task_resumes_after_restart() {
        let dir = tempdir().unwrap();

        // first "session"
        {
            let mut store = FileBackupStore::new(dir.path()).unwrap();
            let mut task = task("t1");
            task.begin().unwrap();
            task.advance().unwrap();
            store.save("t1", &task.backup().unwrap()).unwrap();
        }

        // "restart"
        {
            let store = FileBackupStore::new(dir.path()).unwrap();
            let backup = store.load("t1").unwrap().unwrap();
            let restored = ActiveTask::restore(tag("t1"), phases(), &backup, Log::new()).unwrap();

            assert_eq!(restored.status(), Status::Underway);
            assert_eq!(restored.active_phase().unwrap().name(), "grab");
            assert_eq!(restored.completed_phases().len(), 1);
        }
    }

    #[test]
    fn restored_task_keeps_backup_sequence_monotonic() {
        let mut store = InMemoryBackupStore::new();
        let mut task = task("t1");
        task.begin().unwrap();
        for _ in 0..3 {
            store.save("t1", &task.backup().unwrap()).unwrap();
        }

        let backup = store.load("t1").unwrap().unwrap();
        let mut restored = ActiveTask::restore(tag("t1"), phases(), &backup, Log::new()).unwrap();
        assert!(store.save("t1", &restored.backup().unwrap()).unwrap());
    }

    #[test]
    fn finished_task_restores_as_finished() {
        let mut store = InMemoryBackupStore::new();
        let mut task = task("t1");
        task.begin().unwrap();
        task.cancel().unwrap();
        store.save("t1", &task.backup().unwrap()).unwrap();

        let backup = store.load("t1").unwrap().unwrap();
        let restored = ActiveTask::restore(tag("t1"), phases(), &backup, Log::new()).unwrap();
        assert_eq!(restored.status(), Status::Canceled);
        assert!(restored.active_phase().is_none());
        assert_eq!(restored.pending_phases().count(), 0);
    }
}
