//! Durable single-slot storage for the latest extraction run.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   CURRENT                                   run id of the latest complete run
//!   runs/<run_id>/intermediate_data.json      batch as a JSON array of strings
//!   runs/<run_id>/intermediate_job_desc.txt   raw job description
//!   runs/<run_id>/run.json                    { run_id, saved_at, pages }
//! ```
//!
//! A save writes a fresh run directory, each file through a temp file and a
//! rename, then flips `CURRENT` the same way. A reader resolves `CURRENT`
//! once and reads both payload files from that one run, so it never pairs
//! the batch of one run with the job description of another. The run before
//! the current one is kept when older runs are pruned; a reader that still
//! finds its run gone re-resolves `CURRENT` once.
//!
//! Saves into the same root are serialised: within the process by a mutex
//! per root, and across processes by an advisory lock on `<root>/.lock`
//! held from the first run file written until pruning is done.

use crate::error::PipelineError;
use crate::types::{ExtractionBatch, IntermediateState};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use fd_lock::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CURRENT_FILE: &str = "CURRENT";
const RUNS_DIR: &str = "runs";
const SESSIONS_DIR: &str = "sessions";
const DATA_FILE: &str = "intermediate_data.json";
const JOB_DESC_FILE: &str = "intermediate_job_desc.txt";
const RUN_META_FILE: &str = "run.json";
const LOCK_FILE: &str = ".lock";

static RE_SESSION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

type SaveLock = Arc<Mutex<()>>;

static SAVE_LOCKS: Lazy<std::sync::Mutex<HashMap<PathBuf, SaveLock>>> =
    Lazy::new(|| std::sync::Mutex::new(HashMap::new()));

fn save_lock_for(root: &Path) -> SaveLock {
    let mut locks = SAVE_LOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(root.to_path_buf()).or_default().clone()
}

#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    run_id: Uuid,
    saved_at: DateTime<Utc>,
    pages: usize,
}

/// File-backed store of the latest [`IntermediateState`].
#[derive(Debug, Clone)]
pub struct IntermediateStore {
    root: PathBuf,
    save_lock: SaveLock,
}

impl IntermediateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let save_lock = save_lock_for(&root);
        Self { root, save_lock }
    }

    /// A store isolated under `<root>/sessions/<id>`.
    ///
    /// `id` must match `[A-Za-z0-9_-]{1,64}`.
    pub fn for_session(&self, id: &str) -> Result<Self, PipelineError> {
        if !RE_SESSION_ID.is_match(id) {
            return Err(PipelineError::InvalidInput {
                detail: format!(
                    "session id '{id}' must be 1-64 characters of letters, digits, '_' or '-'"
                ),
            });
        }
        Ok(Self::new(self.root.join(SESSIONS_DIR).join(id)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a completed run, replacing the previous state.
    pub async fn save(
        &self,
        batch: &ExtractionBatch,
        job_description: &str,
    ) -> Result<IntermediateState, PipelineError> {
        let _guard = self.save_lock.lock().await;

        let state = IntermediateState {
            run_id: Uuid::new_v4(),
            saved_at: Utc::now(),
            batch: batch.clone(),
            job_description: job_description.to_string(),
        };

        let root = self.root.clone();
        let to_write = state.clone();
        tokio::task::spawn_blocking(move || write_run(&root, &to_write))
            .await
            .map_err(|e| PipelineError::Internal(format!("Store task panicked: {}", e)))??;

        info!(
            "Saved run {} ({} pages) to {}",
            state.run_id,
            state.batch.len(),
            self.root.display()
        );
        Ok(state)
    }

    /// Read the latest complete run, or [`PipelineError::NoState`].
    pub async fn load(&self) -> Result<IntermediateState, PipelineError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || read_latest(&root))
            .await
            .map_err(|e| PipelineError::Internal(format!("Store task panicked: {}", e)))?
    }
}

fn storage_err(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `dir/name` through a temp file in the same directory.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), PipelineError> {
    let target = dir.join(name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(storage_err(dir))?;
    tmp.write_all(bytes).map_err(storage_err(&target))?;
    tmp.as_file().sync_all().map_err(storage_err(&target))?;
    tmp.persist(&target)
        .map_err(|e| storage_err(&target)(e.error))?;
    Ok(())
}

/// Open (creating if needed) the lock file that guards writes under `root`.
fn open_lock_file(root: &Path) -> Result<RwLock<File>, PipelineError> {
    std::fs::create_dir_all(root).map_err(storage_err(root))?;
    let path = root.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(storage_err(&path))?;
    Ok(RwLock::new(file))
}

fn write_run(root: &Path, state: &IntermediateState) -> Result<(), PipelineError> {
    let lock_path = root.join(LOCK_FILE);
    let mut lock = open_lock_file(root)?;
    let _held = lock.write().map_err(storage_err(&lock_path))?;

    let runs_dir = root.join(RUNS_DIR);
    let run_dir = runs_dir.join(state.run_id.to_string());
    std::fs::create_dir_all(&run_dir).map_err(storage_err(&run_dir))?;

    let meta = RunMeta {
        run_id: state.run_id,
        saved_at: state.saved_at,
        pages: state.batch.len(),
    };
    let meta_json = serde_json::to_vec_pretty(&meta)
        .map_err(|e| PipelineError::Internal(format!("Run metadata did not serialise: {}", e)))?;

    write_atomic(&run_dir, DATA_FILE, state.batch.to_json().as_bytes())?;
    write_atomic(&run_dir, JOB_DESC_FILE, state.job_description.as_bytes())?;
    write_atomic(&run_dir, RUN_META_FILE, &meta_json)?;

    // A corrupt CURRENT is about to be replaced anyway.
    let previous = read_current(root).ok().flatten();
    write_atomic(root, CURRENT_FILE, state.run_id.to_string().as_bytes())?;
    debug!("CURRENT → {}", state.run_id);

    prune_runs(&runs_dir, state.run_id, previous);
    Ok(())
}

/// Remove run directories other than `current` and `previous`.
/// Failures only cost disk space, so they are logged and ignored.
fn prune_runs(runs_dir: &Path, current: Uuid, previous: Option<Uuid>) {
    let entries = match std::fs::read_dir(runs_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {}: {}", runs_dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| Uuid::parse_str(name).ok())
        else {
            continue;
        };
        if id == current || Some(id) == previous {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => debug!("Pruned run {}", id),
            Err(e) => warn!("Could not prune run {}: {}", id, e),
        }
    }
}

fn read_current(root: &Path) -> Result<Option<Uuid>, PipelineError> {
    let path = root.join(CURRENT_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(storage_err(&path)(e)),
    };
    Uuid::parse_str(text.trim())
        .map(Some)
        .map_err(|e| PipelineError::StateCorrupt {
            path,
            detail: format!("invalid run id: {}", e),
        })
}

fn read_latest(root: &Path) -> Result<IntermediateState, PipelineError> {
    match read_current_run(root) {
        Err(PipelineError::Storage { path, source }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(
                "{} vanished while reading; re-resolving {}",
                path.display(),
                CURRENT_FILE
            );
            read_current_run(root)
        }
        other => other,
    }
}

fn read_current_run(root: &Path) -> Result<IntermediateState, PipelineError> {
    let run_id = read_current(root)?.ok_or(PipelineError::NoState)?;
    let run_dir = root.join(RUNS_DIR).join(run_id.to_string());

    let data_path = run_dir.join(DATA_FILE);
    let data = std::fs::read_to_string(&data_path).map_err(storage_err(&data_path))?;
    let batch: ExtractionBatch =
        serde_json::from_str(&data).map_err(|e| PipelineError::StateCorrupt {
            path: data_path.clone(),
            detail: e.to_string(),
        })?;

    let jd_path = run_dir.join(JOB_DESC_FILE);
    let job_description = std::fs::read_to_string(&jd_path).map_err(storage_err(&jd_path))?;

    let meta_path = run_dir.join(RUN_META_FILE);
    let meta_text = std::fs::read_to_string(&meta_path).map_err(storage_err(&meta_path))?;
    let meta: RunMeta =
        serde_json::from_str(&meta_text).map_err(|e| PipelineError::StateCorrupt {
            path: meta_path.clone(),
            detail: e.to_string(),
        })?;

    if meta.run_id != run_id || meta.pages != batch.len() {
        return Err(PipelineError::StateCorrupt {
            path: run_dir,
            detail: format!(
                "run.json describes run {} with {} pages, found run {} with {} records",
                meta.run_id,
                meta.pages,
                run_id,
                batch.len()
            ),
        });
    }

    Ok(IntermediateState {
        run_id,
        saved_at: meta.saved_at,
        batch,
        job_description,
    })
}
