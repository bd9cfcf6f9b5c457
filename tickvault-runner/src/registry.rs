//! Durable job registry.
//!
//! In-memory map guarded by a mutex, mirrored to one JSON document per job
//! under `{metadata}/jobs/{id}.json`. Every mutation rewrites the job's
//! document (atomic tmp + rename), so a restarted process reloads exact
//! job state including progress counters.

use crate::job::BackfillJob;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unknown job id '{0}'")]
    UnknownJob(String),
}

pub struct JobRegistry {
    dir: PathBuf,
    jobs: Mutex<HashMap<String, BackfillJob>>,
}

impl JobRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild the in-memory map from persisted documents. Returns the
    /// number of jobs loaded. Unreadable documents are skipped with a
    /// warning so one corrupt file cannot block startup.
    pub fn load(&self) -> Result<usize, RegistryError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        jobs.clear();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match read_job(&path) {
                Ok(job) => {
                    jobs.insert(job.id.clone(), job);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable job document");
                }
            }
        }
        Ok(jobs.len())
    }

    pub fn insert(&self, job: BackfillJob) -> Result<(), RegistryError> {
        self.persist(&job)?;
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Apply a mutation to one job and persist the result. The returned
    /// value is the job after mutation. The write to disk happens while
    /// the map lock is still held, so documents always land in mutation
    /// order and a crash-restart never resumes from stale progress.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<BackfillJob, RegistryError>
    where
        F: FnOnce(&mut BackfillJob),
    {
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownJob(id.to_string()))?;
        mutate(job);
        let snapshot = job.clone();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Option<BackfillJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        jobs.get(id).cloned()
    }

    /// All jobs, newest first.
    pub fn all(&self) -> Vec<BackfillJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let mut all: Vec<BackfillJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    fn persist(&self, job: &BackfillJob) -> Result<(), RegistryError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", job.id));
        let tmp = self.dir.join(format!("{}.json.tmp", job.id));
        fs::write(&tmp, serde_json::to_vec_pretty(job)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn read_job(path: &Path) -> Result<BackfillJob, RegistryError> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}
