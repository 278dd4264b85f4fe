//! Keeps local copies of remote sources, refreshing them once they are older than a given age.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::Result;
use log::{debug, info, warn};

use crate::error::{CovidRankError, CovidRankResult};

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Something that can retrieve the content behind a URL.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches over HTTP(S). Non-success statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn age_in_days(path: &Path) -> Option<f64> {
    let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Some(age.as_secs_f64() / SECONDS_PER_DAY)
}

/// Sibling of `path` receiving a download before it replaces `path`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Replaces `path` with `bytes` in one rename, so an interrupted write never leaves a truncated
/// copy with a fresh modification time.
async fn write_atomically(path: &Path, bytes: &[u8]) -> CovidRankResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(path);
    if let Err(err) = tokio::fs::write(&partial, bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(err.into());
    }
    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

/// Returns `path` holding the content of `url`.
///
/// A local copy younger than `max_age_days` is used as is unless `force` is set. Otherwise the
/// source is fetched and written to `path`. When the fetch or the write fails an existing (stale)
/// copy is used instead; without one the source is unavailable.
pub async fn update_file<F: Fetch>(
    fetcher: &F,
    url: &str,
    path: &Path,
    max_age_days: f64,
    force: bool,
) -> CovidRankResult<PathBuf> {
    let age = age_in_days(path).await;
    if let Some(age) = age {
        if !force && age < max_age_days {
            info!(
                "Local copy '{}' is {age:.2} days old (limit {max_age_days}), not downloading",
                path.display()
            );
            return Ok(path.to_path_buf());
        }
    }

    let fetched = match fetcher.fetch(url).await {
        Ok(bytes) => write_atomically(path, &bytes)
            .await
            .map(|()| bytes.len())
            .map_err(anyhow::Error::from),
        Err(err) => Err(err),
    };
    match fetched {
        Ok(len) => {
            info!("Downloaded {len} bytes from '{url}' to '{}'", path.display());
            Ok(path.to_path_buf())
        }
        Err(err) if age.is_some() => {
            warn!(
                "Failed to fetch '{url}' ({err:#}), using stale copy '{}'",
                path.display()
            );
            Ok(path.to_path_buf())
        }
        Err(err) => {
            warn!("Failed to fetch '{url}': {err:#}");
            Err(CovidRankError::SourceUnavailable {
                url: url.to_string(),
                path: path.to_path_buf(),
            })
        }
    }
}
