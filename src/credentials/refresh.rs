use tracing::{error, info, warn};

use super::pool::CredentialPool;
use super::validation;
use crate::worker::HttpClient;

impl CredentialPool {
    /// Download a cookie file from `source` into the refresh slot.
    ///
    /// An invalid download is deleted. One retry follows a short pause.
    pub async fn refresh(&self, http: &HttpClient, source: &str) -> bool {
        if self.try_refresh(http, source).await {
            return true;
        }

        warn!("Retrying credential refresh after cleanup");
        let _ = tokio::fs::remove_file(&self.refresh_path).await;
        tokio::time::sleep(self.refresh_retry_delay).await;
        self.try_refresh(http, source).await
    }

    /// Keep a valid refresh file, otherwise replace it from `source`
    pub async fn ensure(&self, http: &HttpClient, source: Option<&str>) -> bool {
        if tokio::fs::try_exists(&self.refresh_path).await.unwrap_or(false) {
            let path = self.refresh_path.clone();
            let valid = tokio::task::spawn_blocking(move || validation::validate(&path))
                .await
                .unwrap_or(false);
            if valid {
                info!(path = %self.refresh_path.display(), "Valid credential file present, skipping refresh");
                return true;
            }
            warn!(path = %self.refresh_path.display(), "Existing credential file is malformed, deleting");
            let _ = tokio::fs::remove_file(&self.refresh_path).await;
        }

        let Some(source) = source else {
            warn!("No credential refresh source configured");
            return false;
        };
        self.refresh(http, source).await
    }

    async fn try_refresh(&self, http: &HttpClient, source: &str) -> bool {
        let body = match tokio::time::timeout(self.refresh_timeout, http.fetch_bytes(source)).await
        {
            Ok(Ok(body)) if !body.is_empty() => body,
            Ok(Ok(_)) => {
                error!("Credential source returned an empty body");
                return false;
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to fetch credential file");
                return false;
            }
            Err(_) => {
                error!(timeout = ?self.refresh_timeout, "Credential fetch timed out");
                return false;
            }
        };

        if let Err(issue) = validation::check_content(&String::from_utf8_lossy(&body)) {
            error!(%issue, "Downloaded credential file is malformed or cloned, discarding");
            return false;
        }

        if let Err(e) = self.write_refresh_file(&body).await {
            error!(path = %self.refresh_path.display(), error = %e, "Failed to save credential file");
            return false;
        }

        match self.rescan().await {
            Ok(count) => {
                info!(path = %self.refresh_path.display(), pool_size = count, "Credential file refreshed");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to reload credential pool after refresh");
                false
            }
        }
    }

    async fn write_refresh_file(&self, body: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.refresh_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.refresh_path.with_extension("txt.part");
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &self.refresh_path).await
    }
}
