//! Local downloads directory: dedup lookups and temp-then-rename targets
//!
//! Every write lands in a hidden `.part` file next to its destination and is
//! renamed into place only once a non-zero byte count is confirmed on disk.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AcquireError;
use crate::reference::MediaKind;

const PART_SUFFIX: &str = ".part";

/// Container extensions written for each kind
#[derive(Debug, Clone)]
pub struct OutputFormats {
    pub audio: String,
    pub video: String,
    pub explicit_audio: String,
    pub explicit_video: String,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            audio: "m4a".to_string(),
            video: "mp4".to_string(),
            explicit_audio: "mp3".to_string(),
            explicit_video: "mp4".to_string(),
        }
    }
}

/// Flat directory of `{stem}.{ext}` media files
#[derive(Debug, Clone)]
pub struct DownloadStore {
    root: PathBuf,
    formats: OutputFormats,
}

impl DownloadStore {
    pub fn new(root: impl Into<PathBuf>, formats: OutputFormats) -> Self {
        Self {
            root: root.into(),
            formats,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// File stem for `id` under `kind`
    pub fn stem(&self, id: &str, kind: &MediaKind) -> String {
        match kind {
            MediaKind::ExplicitFormat(request) => sanitize_stem(&request.title),
            _ => id.to_string(),
        }
    }

    /// Extension the final file is written with
    pub fn extension(&self, kind: &MediaKind) -> &str {
        match kind {
            MediaKind::Audio => &self.formats.audio,
            MediaKind::Video => &self.formats.video,
            MediaKind::ExplicitFormat(request) if request.audio => &self.formats.explicit_audio,
            MediaKind::ExplicitFormat(_) => &self.formats.explicit_video,
        }
    }

    /// Extensions accepted as an existing copy, in lookup order
    pub fn cache_extensions(&self, kind: &MediaKind) -> Vec<String> {
        let mut extensions = vec![self.extension(kind).to_string()];
        let extra: &[&str] = match kind {
            MediaKind::Audio => &["m4a", "mp3", "webm"],
            MediaKind::Video => &["mp4", "webm", "mkv"],
            MediaKind::ExplicitFormat(_) => &[],
        };
        for ext in extra {
            if !extensions.iter().any(|e| e == ext) {
                extensions.push((*ext).to_string());
            }
        }
        extensions
    }

    /// Existing non-empty file for `(id, kind)`, if any
    pub async fn already_present(&self, id: &str, kind: &MediaKind) -> Option<PathBuf> {
        let stem = self.stem(id, kind);
        for ext in self.cache_extensions(kind) {
            let candidate = self.root.join(format!("{}.{}", stem, ext));
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {
                    debug!(path = %candidate.display(), "Found existing download");
                    return Some(candidate);
                }
                _ => continue,
            }
        }
        None
    }

    /// Fresh target for one request; the temp name is unique per call
    pub fn target_for(&self, id: &str, kind: &MediaKind) -> DownloadTarget {
        let stem = self.stem(id, kind);
        let dest_path = self
            .root
            .join(format!("{}.{}", stem, self.extension(kind)));
        let temp_path = self
            .root
            .join(format!(".{}.{}{}", stem, Uuid::new_v4().simple(), PART_SUFFIX));
        DownloadTarget {
            dest_path,
            temp_path,
            spent: Arc::default(),
        }
    }

    /// Remove `.part` leftovers from work that was cancelled mid-flight
    pub async fn sweep_partials(&self) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') && name.contains(PART_SUFFIX) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(file = %name, error = %e, "Failed to remove stale partial");
                } else {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.root.display(), "Swept stale partial downloads");
        }
        Ok(removed)
    }
}

/// Destination plus the private temp path that is renamed onto it.
///
/// One target lives for one request, across every retry of every strategy,
/// so it also records which credential files that request has spent.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub dest_path: PathBuf,
    pub temp_path: PathBuf,
    spent: Arc<Mutex<HashSet<PathBuf>>>,
}

impl DownloadTarget {
    /// Output stem for one tool run, unique per call and prefixed by `temp_path`
    pub fn run_stem(&self) -> PathBuf {
        let mut name = self.temp_path.clone().into_os_string();
        name.push(format!(".{}", &Uuid::new_v4().simple().to_string()[..8]));
        PathBuf::from(name)
    }

    /// Record `credential` as spent; false when this request already used it
    pub fn mark_spent(&self, credential: &Path) -> bool {
        self.spent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(credential.to_path_buf())
    }

    pub fn is_spent(&self, credential: &Path) -> bool {
        self.spent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(credential)
    }

    pub fn spent_count(&self) -> usize {
        self.spent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Verify the temp file and rename it onto the destination
    pub async fn commit(&self) -> Result<u64, AcquireError> {
        self.commit_file(&self.temp_path).await
    }

    /// Verify `produced` (a file written by an external tool) and rename it into place
    pub async fn commit_file(&self, produced: &Path) -> Result<u64, AcquireError> {
        let size = match tokio::fs::metadata(produced).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AcquireError::TransferIntegrityFailure(format!(
                    "no output at {}",
                    produced.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if size == 0 {
            let _ = tokio::fs::remove_file(produced).await;
            return Err(AcquireError::TransferIntegrityFailure(
                "transfer produced zero bytes".to_string(),
            ));
        }

        tokio::fs::rename(produced, &self.dest_path).await?;
        debug!(dest = %self.dest_path.display(), bytes = size, "Committed download");
        Ok(size)
    }

    /// Best-effort removal of the temp file and anything a tool derived from it
    pub async fn discard(&self) {
        let _ = tokio::fs::remove_file(&self.temp_path).await;

        let (Some(dir), Some(prefix)) = (self.temp_path.parent(), self.temp_path.file_name()) else {
            return;
        };
        let prefix = prefix.to_string_lossy().into_owned();

        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }
}

/// Turn a caller-supplied title into a safe single-component file stem
pub fn sanitize_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.chars().take(120).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::FormatRequest;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DownloadStore {
        DownloadStore::new(dir.path(), OutputFormats::default())
    }

    #[tokio::test]
    async fn test_already_present_requires_non_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        std::fs::write(dir.path().join("abcdefghijk.m4a"), b"").unwrap();
        assert!(store.already_present("abcdefghijk", &MediaKind::Audio).await.is_none());

        std::fs::write(dir.path().join("abcdefghijk.webm"), b"data").unwrap();
        let found = store.already_present("abcdefghijk", &MediaKind::Audio).await.unwrap();
        assert_eq!(found, dir.path().join("abcdefghijk.webm"));
    }

    #[tokio::test]
    async fn test_video_cache_ignores_audio_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(dir.path().join("abcdefghijk.m4a"), b"data").unwrap();

        assert!(store.already_present("abcdefghijk", &MediaKind::Video).await.is_none());
    }

    #[test]
    fn test_target_layout() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let target = store.target_for("abcdefghijk", &MediaKind::Audio);
        assert_eq!(target.dest_path, dir.path().join("abcdefghijk.m4a"));
        assert_eq!(target.temp_path.parent(), Some(dir.path()));
        assert!(target.temp_path.to_string_lossy().ends_with(".part"));

        let other = store.target_for("abcdefghijk", &MediaKind::Audio);
        assert_ne!(target.temp_path, other.temp_path);
    }

    #[test]
    fn test_run_stems_are_distinct_and_discardable() {
        let dir = TempDir::new().unwrap();
        let target = store(&dir).target_for("abcdefghijk", &MediaKind::Audio);

        let first = target.run_stem();
        let second = target.run_stem();

        assert_ne!(first, second);
        let prefix = target.temp_path.to_string_lossy().into_owned();
        assert!(first.to_string_lossy().starts_with(&prefix));
        assert!(second.to_string_lossy().starts_with(&prefix));
    }

    #[test]
    fn test_spent_credentials_are_shared_by_clones() {
        let dir = TempDir::new().unwrap();
        let target = store(&dir).target_for("abcdefghijk", &MediaKind::Audio);
        let retry_view = target.clone();

        assert!(target.mark_spent(Path::new("cookies/a.txt")));
        assert!(retry_view.is_spent(Path::new("cookies/a.txt")));
        assert!(!retry_view.mark_spent(Path::new("cookies/a.txt")));
        assert_eq!(retry_view.spent_count(), 1);

        let fresh = store(&dir).target_for("abcdefghijk", &MediaKind::Audio);
        assert!(!fresh.is_spent(Path::new("cookies/a.txt")));
    }

    #[test]
    fn test_explicit_format_uses_title() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let kind = MediaKind::ExplicitFormat(FormatRequest {
            format_id: "137".to_string(),
            title: "../My Song: Live".to_string(),
            audio: false,
        });

        let target = store.target_for("abcdefghijk", &kind);
        assert_eq!(target.dest_path, dir.path().join("_My Song_ Live.mp4"));
    }

    #[tokio::test]
    async fn test_commit_renames_non_empty_file() {
        let dir = TempDir::new().unwrap();
        let target = store(&dir).target_for("abcdefghijk", &MediaKind::Video);
        std::fs::write(&target.temp_path, b"movie").unwrap();

        let bytes = target.commit().await.unwrap();

        assert_eq!(bytes, 5);
        assert!(!target.temp_path.exists());
        assert_eq!(std::fs::read(&target.dest_path).unwrap(), b"movie");
    }

    #[tokio::test]
    async fn test_commit_rejects_zero_bytes() {
        let dir = TempDir::new().unwrap();
        let target = store(&dir).target_for("abcdefghijk", &MediaKind::Audio);
        std::fs::write(&target.temp_path, b"").unwrap();

        let result = target.commit().await;

        assert!(matches!(result, Err(AcquireError::TransferIntegrityFailure(_))));
        assert!(!target.dest_path.exists());
        assert!(!target.temp_path.exists());
    }

    #[tokio::test]
    async fn test_discard_removes_derived_files() {
        let dir = TempDir::new().unwrap();
        let target = store(&dir).target_for("abcdefghijk", &MediaKind::Audio);
        std::fs::write(&target.temp_path, b"x").unwrap();
        let derived = PathBuf::from(format!("{}.webm", target.temp_path.display()));
        std::fs::write(&derived, b"y").unwrap();

        target.discard().await;

        assert!(!target.temp_path.exists());
        assert!(!derived.exists());
    }

    #[tokio::test]
    async fn test_sweep_partials() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(dir.path().join(".abc.123.part"), b"x").unwrap();
        std::fs::write(dir.path().join(".abc.456.part.m4a"), b"x").unwrap();
        std::fs::write(dir.path().join("abcdefghijk.m4a"), b"keep").unwrap();

        assert_eq!(store.sweep_partials().await.unwrap(), 2);
        assert!(dir.path().join("abcdefghijk.m4a").exists());
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("  "), "untitled");
        assert_eq!(sanitize_stem("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_stem("...hidden"), "hidden");
    }
}
