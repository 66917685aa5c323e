//! Filesystem-backed library manager.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::config::LibraryConfig;
use crate::media::MediaItem;

use super::{LibraryError, LibraryManager};

/// Looks for an item's `filled_by_file` under the configured roots.
///
/// Debrid mounts usually expose `<root>/<torrent name>/<file>`, so that path
/// and `<root>/<file>` are tried first, then a bounded recursive search.
pub struct FsLibrary {
    roots: Vec<PathBuf>,
    max_depth: usize,
}

impl FsLibrary {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            max_depth: config.max_search_depth,
        }
    }

    async fn search(dir: &Path, file_name: &str, depth: usize) -> Result<bool, std::io::Error> {
        let mut pending = vec![(dir.to_path_buf(), 0usize)];
        while let Some((current, level)) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if level > 0 => {
                    debug!(path = %current.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if level < depth {
                        pending.push((entry.path(), level + 1));
                    }
                } else if entry.file_name().to_string_lossy() == file_name {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl LibraryManager for FsLibrary {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn item_file_present(&self, item: &MediaItem) -> Result<bool, LibraryError> {
        let Some(file) = item.filled_by_file.as_deref() else {
            return Ok(false);
        };
        let file_name = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());

        for root in &self.roots {
            let mut direct = vec![root.join(&file_name)];
            if let Some(ref title) = item.filled_by_title {
                direct.insert(0, root.join(title).join(&file_name));
            }
            for candidate in direct {
                if fs::try_exists(&candidate).await.unwrap_or(false) {
                    debug!(item_id = item.id, path = %candidate.display(), "Found collected file");
                    return Ok(true);
                }
            }

            match Self::search(root, &file_name, self.max_depth).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(source) => {
                    return Err(LibraryError::RootUnavailable {
                        path: root.clone(),
                        source,
                    })
                }
            }
        }
        Ok(false)
    }

    async fn trigger_scan(&self, path: &str) {
        info!(path, "Library scan requested");
    }
}
