//! Webhook upload storage.
//!
//! Each file is written straight into the uploads directory under a name no
//! other upload can take. Files stay provisional until [`StagedUploads::keep`]
//! is called; dropping the set removes them, so a rejected message leaves
//! nothing behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, error};

/// Random characters between the timestamp and the original name.
const UNIQUE_CHARS: usize = 8;

/// Uploads written for one inbound message.
#[derive(Debug)]
pub struct StagedUploads {
    dir: PathBuf,
    files: Vec<TempPath>,
}

impl StagedUploads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// Write one upload and return its path. The name is
    /// `<unix-millis>-<random>-<stem with whitespace as _><ext>`.
    pub async fn stage(
        &mut self,
        original: &str,
        now_millis: i64,
        bytes: impl AsRef<[u8]> + Send + 'static,
    ) -> std::io::Result<PathBuf> {
        let dir = self.dir.clone();
        let (prefix, suffix) = upload_name_affixes(original, now_millis);

        let temp = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            std::fs::create_dir_all(&dir)?;
            // `tempfile` opens with create-new and retries on a clash.
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .rand_bytes(UNIQUE_CHARS)
                .tempfile_in(&dir)?;
            file.write_all(bytes.as_ref())?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(std::io::Error::other)??;

        let path = temp.to_path_buf();
        debug!(path = %path.display(), "Staged upload");
        self.files.push(temp);
        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Make every staged file permanent.
    pub fn keep(self) -> Vec<PathBuf> {
        let mut kept = Vec::with_capacity(self.files.len());
        for temp in self.files {
            match temp.keep() {
                Ok(path) => kept.push(path),
                Err(e) => error!(path = %e.path.display(), error = %e.error, "Failed to keep upload"),
            }
        }
        kept
    }
}

/// Prefix and suffix around the random part of an upload name.
fn upload_name_affixes(original: &str, now_millis: i64) -> (String, String) {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let path = Path::new(base);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(base);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let mut stem = stem.split_whitespace().collect::<Vec<_>>().join("_");
    if stem.is_empty() {
        stem = "upload".to_string();
    }
    (format!("{now_millis}-"), format!("-{stem}{ext}"))
}
