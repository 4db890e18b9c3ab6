//! Download of the item image to a reusable transient file.
//!
//! Every download goes to `<dir>/<stem>.<ext>`, overwriting whatever the
//! previous run left behind. Failures only cost the image, never the item.

use crate::config::ImageSettings;
use crate::error::ImageError;
use crate::fetcher::Fetch;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct ImageRetriever {
    dir: PathBuf,
    stem: String,
    default_extension: String,
}

impl ImageRetriever {
    pub fn new(settings: &ImageSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            stem: settings.stem.clone(),
            default_extension: settings.default_extension.clone(),
        }
    }

    /// Download `image_url`; `None` when anything goes wrong.
    #[instrument(level = "info", skip(self, fetcher))]
    pub async fn retrieve<F: Fetch>(&self, fetcher: &F, image_url: &str) -> Option<PathBuf> {
        match self.try_retrieve(fetcher, image_url).await {
            Ok(path) => {
                info!(path = %path.display(), "Image saved locally");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Image retrieval failed; continuing without image");
                None
            }
        }
    }

    async fn try_retrieve<F: Fetch>(
        &self,
        fetcher: &F,
        image_url: &str,
    ) -> Result<PathBuf, ImageError> {
        let bytes = fetcher.fetch(image_url).await?;
        let path = self.target_path(image_url);
        fs::write(&path, &bytes)
            .await
            .map_err(|source| ImageError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(bytes = bytes.len(), "Wrote image");
        Ok(path)
    }

    /// Transient file name for an image url, keeping its extension.
    pub fn target_path(&self, image_url: &str) -> PathBuf {
        let extension = extension_of(image_url).unwrap_or_else(|| self.default_extension.clone());
        self.dir.join(format!("{}.{}", self.stem, extension))
    }

    /// Remove a transient image. A file that is already gone is fine.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed transient image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Transient image already gone")
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Cannot remove transient image"),
        }
    }
}

fn extension_of(image_url: &str) -> Option<String> {
    let url = Url::parse(image_url).ok()?;
    let file_name = url.path_segments()?.next_back()?.to_string();
    Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}
