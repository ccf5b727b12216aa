/**
 * PERSISTENCE - crash-safe snapshot file
 *
 * ROLE:
 * Keeps the last committed store contents on disk so a restart recovers them.
 *
 * PROTOCOL:
 * 1. serialize the full view to the staging file (`weather_data.json.tmp`)
 * 2. write, fsync and close the staging file
 * 3. rename staging over the durable file (`weather_data.json`), fsync the directory
 * 4. on any failure: remove staging, report the error, durable file untouched
 * 5. on startup: a leftover staging file is a crash leftover and is discarded
 *
 * Commits are serialized by `commit_lock`; the view is taken while holding it
 * so the last finished commit always carries the newest state it could see.
 */

use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use weather_protocol::MAX_CLOCK;

use crate::models::Reading;

pub const DURABLE_FILE_NAME: &str = "weather_data.json";
pub const STAGING_FILE_NAME: &str = "weather_data.json.tmp";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug)]
pub struct PersistenceManager {
    durable_path: PathBuf,
    staging_path: PathBuf,
    commit_lock: Mutex<()>,
}

impl PersistenceManager {
    /// Manager writing into `data_dir`, created if missing.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, PersistenceError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|e| PersistenceError::io(data_dir, e))?;
        Ok(Self {
            durable_path: data_dir.join(DURABLE_FILE_NAME),
            staging_path: data_dir.join(STAGING_FILE_NAME),
            commit_lock: Mutex::new(()),
        })
    }

    pub fn durable_path(&self) -> &Path {
        &self.durable_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Writes the view produced by `view` through the staging protocol.
    /// Returns the number of readings committed.
    pub fn commit<F>(&self, view: F) -> Result<usize, PersistenceError>
    where
        F: FnOnce() -> Vec<Reading>,
    {
        let _guard = self.commit_lock.lock();
        let readings = view();
        let bytes = serde_json::to_vec_pretty(&readings)?;

        if let Err(e) = self.stage(&bytes).and_then(|_| self.publish()) {
            let _ = fs::remove_file(&self.staging_path);
            return Err(e);
        }

        debug!(readings = readings.len(), path = ?self.durable_path, "snapshot committed");
        Ok(readings.len())
    }

    /// Steps 1-2: staging file fully written and synced, not yet visible.
    pub(crate) fn stage(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let mut file = File::create(&self.staging_path)
            .map_err(|e| PersistenceError::io(&self.staging_path, e))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| PersistenceError::io(&self.staging_path, e))?;
        Ok(())
    }

    /// Step 3: atomic replace of the durable file.
    fn publish(&self) -> Result<(), PersistenceError> {
        fs::rename(&self.staging_path, &self.durable_path)
            .map_err(|e| PersistenceError::io(&self.durable_path, e))?;
        fsync_parent(&self.durable_path).map_err(|e| PersistenceError::io(&self.durable_path, e))
    }

    /// Loads the last committed snapshot. Runs before any connection is
    /// accepted. A leftover staging file is discarded; an unreadable or
    /// corrupt durable file is logged and treated as empty.
    pub fn recover(&self) -> Vec<Reading> {
        let _guard = self.commit_lock.lock();

        if self.staging_path.exists() {
            warn!(path = ?self.staging_path, "discarding staging file left by an interrupted commit");
            if let Err(e) = fs::remove_file(&self.staging_path) {
                error!(path = ?self.staging_path, "failed to remove staging file: {}", e);
            }
        }

        if !self.durable_path.exists() {
            info!(path = ?self.durable_path, "no snapshot file, starting fresh");
            return Vec::new();
        }

        let bytes = match fs::read(&self.durable_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(path = ?self.durable_path, "failed to read snapshot, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Reading>>(&bytes) {
            Ok(readings) => {
                let total = readings.len();
                let readings: Vec<Reading> = readings
                    .into_iter()
                    .filter(|r| !r.producer_id.trim().is_empty() && r.received_logical_time <= MAX_CLOCK)
                    .collect();
                if readings.len() != total {
                    warn!(
                        dropped = total - readings.len(),
                        "snapshot records without producer id or with out-of-range clock ignored"
                    );
                }
                info!(readings = readings.len(), path = ?self.durable_path, "snapshot recovered");
                readings
            }
            Err(e) => {
                error!(path = ?self.durable_path, "corrupt snapshot, starting empty: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(target_family = "unix")]
fn fsync_parent(path: &Path) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    File::open(parent)?.sync_all()
}

#[cfg(not(target_family = "unix"))]
fn fsync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
