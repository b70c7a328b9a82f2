use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::CredentialError;
use super::validation;
use crate::config::CredentialsConfig;

const CREDENTIAL_EXTENSION: &str = "txt";

/// One cookie file and its usage history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFile {
    pub path: PathBuf,
    pub loaded_at: OffsetDateTime,
    pub failure_count: u32,
    pub last_used: Option<OffsetDateTime>,
}

impl CredentialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded_at: OffsetDateTime::now_utc(),
            failure_count: 0,
            last_used: None,
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    files: Vec<CredentialFile>,
    index: usize,
}

/// Rotating set of cookie files shared by all in-flight requests.
///
/// The lock guards only index and list mutation; callers get clones and never
/// hold it across I/O.
#[derive(Debug)]
pub struct CredentialPool {
    dir: PathBuf,
    pub(super) refresh_path: PathBuf,
    pub(super) refresh_retry_delay: Duration,
    pub(super) refresh_timeout: Duration,
    random_start: bool,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Scan the configured directory; fails when no valid file remains
    pub fn load(config: &CredentialsConfig) -> Result<Self, CredentialError> {
        let pool = Self::empty(config);
        if pool.reload()? == 0 {
            return Err(CredentialError::NoCredentialsAvailable(config.dir.clone()));
        }
        Ok(pool)
    }

    /// Pool with no files yet; strategies needing credentials will refuse
    pub fn empty(config: &CredentialsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            refresh_path: config.refresh_path(),
            refresh_retry_delay: Duration::from_millis(config.refresh_retry_delay_ms),
            refresh_timeout: Duration::from_secs(config.refresh_timeout_secs),
            random_start: config.random_start,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn refresh_path(&self) -> &Path {
        &self.refresh_path
    }

    /// Rescan the directory, deleting files that fail validation.
    ///
    /// Usage history survives for paths that are still present.
    pub fn reload(&self) -> Result<usize, CredentialError> {
        let paths = scan(&self.dir)?;
        Ok(self.install(paths))
    }

    /// `reload` with the directory scan moved onto the blocking pool
    pub async fn rescan(&self) -> Result<usize, CredentialError> {
        let dir = self.dir.clone();
        let paths = tokio::task::spawn_blocking(move || scan(&dir))
            .await
            .map_err(|e| CredentialError::Io(std::io::Error::other(e)))??;
        Ok(self.install(paths))
    }

    fn install(&self, paths: Vec<PathBuf>) -> usize {
        let mut state = self.lock();
        let previous = std::mem::take(&mut state.files);
        state.files = paths
            .into_iter()
            .map(|path| {
                previous
                    .iter()
                    .find(|f| f.path == path)
                    .cloned()
                    .unwrap_or_else(|| CredentialFile::new(path))
            })
            .collect();

        state.index = match state.files.len() {
            0 => 0,
            len if self.random_start => rand::rng().random_range(0..len),
            _ => 0,
        };

        let count = state.files.len();
        info!(dir = %self.dir.display(), count, "Loaded credential files");
        count
    }

    /// File requests should use right now
    pub fn current(&self) -> Result<CredentialFile, CredentialError> {
        let mut state = self.lock();
        let index = state.index;
        let file = state
            .files
            .get_mut(index)
            .ok_or_else(|| CredentialError::NoCredentialsAvailable(self.dir.clone()))?;
        file.last_used = Some(OffsetDateTime::now_utc());
        Ok(file.clone())
    }

    /// Advance to the next file, wrapping at the end
    pub fn rotate(&self) -> Result<CredentialFile, CredentialError> {
        let mut state = self.lock();
        let len = state.files.len();
        if len == 0 {
            return Err(CredentialError::NoCredentialsAvailable(self.dir.clone()));
        }

        state.index = (state.index + 1) % len;
        let index = state.index;
        let file = &mut state.files[index];
        file.last_used = Some(OffsetDateTime::now_utc());
        debug!(path = %file.path.display(), "Rotated to next credential file");
        Ok(file.clone())
    }

    /// Count a blocking failure against `path`
    pub fn record_failure(&self, path: &Path) {
        let mut state = self.lock();
        if let Some(file) = state.files.iter_mut().find(|f| f.path == path) {
            file.failure_count += 1;
            warn!(
                path = %path.display(),
                failures = file.failure_count,
                "Credential file reported blocked"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<CredentialFile> {
        self.lock().files.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Valid `*.txt` files in `dir`, sorted by name; invalid ones are deleted
fn scan(dir: &Path) -> Result<Vec<PathBuf>, CredentialError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == CREDENTIAL_EXTENSION)
        })
        .collect();
    candidates.sort();

    let mut valid = Vec::with_capacity(candidates.len());
    for path in candidates {
        match validation::check_file(&path) {
            Ok(()) => valid.push(path),
            Err(issue) => {
                warn!(path = %path.display(), %issue, "Deleting invalid credential file");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to delete credential file");
                }
            }
        }
    }

    Ok(valid)
}
