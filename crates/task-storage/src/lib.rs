//! # task-storage
//!
//! why: keep the latest backup of every active task so it can be restored after a restart
//! relations: stores task-core Backup values produced by ActiveTask::backup
//! what: BackupStore trait, FileBackupStore implementation, InMemoryBackupStore for testing

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use task_core::Backup;
use tracing::{debug, warn};

/// trait for storing the latest backup of each task
///
/// this abstraction allows the same code to work with:
/// - real filesystem (native)
/// - in-memory (testing)
pub trait BackupStore {
    /// store a backup for the task
    ///
    /// returns false and keeps the stored backup when `backup` is not newer
    fn save(&mut self, task_id: &str, backup: &Backup) -> io::Result<bool>;

    /// load the latest backup for the task, if any
    fn load(&self, task_id: &str) -> io::Result<Option<Backup>>;

    /// forget the task (e.g. once it has finished)
    fn remove(&mut self, task_id: &str) -> io::Result<()>;

    /// ids of every task with a stored backup, sorted
    fn task_ids(&self) -> io::Result<Vec<String>>;

    /// clear all stored backups (for testing)
    fn clear(&mut self) -> io::Result<()>;
}

// -- file storage implementation --

/// file-based backup store using std::fs
///
/// stores one `<task_id>.json` file per task in a directory
pub struct FileBackupStore {
    /// directory path for backup files
    dir: PathBuf,
}

impl FileBackupStore {
    /// create a new store at the given directory
    /// creates the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// directory this store writes to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// get the path to the backup file of a task
    fn backup_path(&self, task_id: &str) -> io::Result<PathBuf> {
        check_task_id(task_id)?;
        Ok(self.dir.join(format!("{task_id}.json")))
    }
}

/// on-disk record, keeps the id so a renamed file is detected
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredBackup {
    task_id: String,
    backup: Backup,
}

impl BackupStore for FileBackupStore {
    fn save(&mut self, task_id: &str, backup: &Backup) -> io::Result<bool> {
        if let Some(current) = self.load(task_id)? {
            if current.sequence() >= backup.sequence() {
                warn!(
                    task_id,
                    stored = current.sequence(),
                    incoming = backup.sequence(),
                    "ignoring stale backup"
                );
                return Ok(false);
            }
        }

        let record = StoredBackup {
            task_id: task_id.to_string(),
            backup: backup.clone(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // atomic write: write to temp file then rename
        let temp_path = self.dir.join(format!("{task_id}.tmp"));
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, self.backup_path(task_id)?)?;

        debug!(task_id, sequence = backup.sequence(), "backup saved");
        Ok(true)
    }

    fn load(&self, task_id: &str) -> io::Result<Option<Backup>> {
        let path = self.backup_path(task_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let record: StoredBackup = serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if record.task_id != task_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} holds a backup for {}", path.display(), record.task_id),
            ));
        }

        Ok(Some(record.backup))
    }

    fn remove(&mut self, task_id: &str) -> io::Result<()> {
        match fs::remove_file(self.backup_path(task_id)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn task_ids(&self) -> io::Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn clear(&mut self) -> io::Result<()> {
        for task_id in self.task_ids()? {
            let _ = fs::remove_file(self.backup_path(&task_id)?);
        }
        Ok(())
    }
}

/// ids become file names, so they must not be able to escape the directory
fn check_task_id(task_id: &str) -> io::Result<()> {
    let invalid = task_id.is_empty()
        || task_id == "."
        || task_id == ".."
        || task_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("task id {task_id:?} cannot be used as a file name"),
        ));
    }
    Ok(())
}

// -- in-memory storage implementation --

/// in-memory backup store for testing
///
/// stores all state in memory, no persistence across restarts
#[derive(Default)]
pub struct InMemoryBackupStore {
    backups: BTreeMap<String, Backup>,
}

impl InMemoryBackupStore {
    /// create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupStore for InMemoryBackupStore {
    fn save(&mut self, task_id: &str, backup: &Backup) -> io::Result<bool> {
        if let Some(current) = self.backups.get(task_id) {
            if current.sequence() >= backup.sequence() {
                return Ok(false);
            }
        }
        self.backups.insert(task_id.to_string(), backup.clone());
        Ok(true)
    }

    fn load(&self, task_id: &str) -> io::Result<Option<Backup>> {
        Ok(self.backups.get(task_id).cloned())
    }

    fn remove(&mut self, task_id: &str) -> io::Result<()> {
        self.backups.remove(task_id);
        Ok(())
    }

    fn task_ids(&self) -> io::Result<Vec<String>> {
        Ok(self.backups.keys().cloned().collect())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.backups.clear();
        Ok(())
    }
}
