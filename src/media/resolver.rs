//! Turns a job's media source into a local file a worker can probe.
//!
//! Local files pass straight through. Remote URLs are dispatched by host:
//! YouTube and LinkedIn go through yt-dlp, Google Drive and everything else is
//! fetched over HTTP into the job's scratch directory.

use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::media::cleanup::Cleanup;
use crate::media::command::CommandExecutor;
use crate::media::probe::extension_of;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Base name (before the extension) of every downloaded file.
const DOWNLOAD_STEM: &str = "download";

/// Where a job's media comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// A file already on disk. Non-persistent files (uploads) are deleted
    /// when the job finishes.
    LocalFile { path: PathBuf, persistent: bool },
    RemoteUrl { url: String },
}

impl MediaSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::RemoteUrl { .. })
    }

    /// Short human-readable form for logs and events.
    pub fn describe(&self) -> String {
        match self {
            MediaSource::LocalFile { path, .. } => path.display().to_string(),
            MediaSource::RemoteUrl { url } => url.clone(),
        }
    }
}

/// Remote source families, distinguished by URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    YouTube,
    GoogleDrive,
    LinkedIn,
    Direct,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::YouTube => "YouTube",
            SourceKind::GoogleDrive => "Google Drive",
            SourceKind::LinkedIn => "LinkedIn",
            SourceKind::Direct => "direct link",
        };
        f.write_str(name)
    }
}

/// Classifies `url` by host (and path, for LinkedIn posts).
///
/// Anything unparseable or unrecognized is `Direct`.
pub fn classify_url(url: &str) -> SourceKind {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return SourceKind::Direct;
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = parsed.path();

    if host.contains("youtube.com") || host.contains("youtu.be") || host.contains("yt.be") {
        SourceKind::YouTube
    } else if host.contains("drive.google.com") {
        SourceKind::GoogleDrive
    } else if host.contains("linkedin.com")
        && (path.contains("/feed/update/urn:li:activity:") || path.contains("/posts/"))
    {
        SourceKind::LinkedIn
    } else {
        SourceKind::Direct
    }
}

/// Extracts the file id from `/file/d/<id>/...` or `?id=<id>` Drive links.
pub fn drive_file_id(url: &str) -> Option<String> {
    if let Some((_, rest)) = url.split_once("/file/d/") {
        let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
        return (!id.is_empty()).then(|| id.to_string());
    }

    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Direct-download form of a Drive share link.
pub fn drive_download_url(url: &str) -> Option<String> {
    drive_file_id(url).map(|id| format!("https://drive.google.com/uc?export=download&id={}", id))
}

/// Local file name for a direct download, keeping a supported extension from
/// the URL path and falling back to `.mp4`.
pub fn direct_file_name(url: &str) -> String {
    let ext = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| extension_of(Path::new(u.path())))
        .filter(|ext| defaults::is_supported_extension(ext))
        .unwrap_or_else(|| "mp4".to_string());
    format!("{}.{}", DOWNLOAD_STEM, ext)
}

/// A resolved local media file.
///
/// Owned handles point at files the worker created (downloads, uploads) and
/// are deleted by [`MediaHandle::dispose`]. Borrowed handles are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    path: PathBuf,
    owned: bool,
}

impl MediaHandle {
    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: true,
        }
    }

    pub fn borrowed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Deletes the file if this handle owns it. Blocking.
    pub fn dispose(self, cleanup: &Cleanup) -> bool {
        if self.owned {
            cleanup.remove_file(&self.path)
        } else {
            true
        }
    }
}

/// Maps a media source to a local file.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves `source`, downloading into `scratch_dir` when remote.
    ///
    /// `cookies` is an optional cookie file forwarded to downloaders that need
    /// authentication.
    async fn resolve(
        &self,
        source: &MediaSource,
        cookies: Option<&Path>,
        scratch_dir: &Path,
    ) -> Result<MediaHandle>;
}

#[async_trait]
impl<T: MediaResolver + ?Sized> MediaResolver for Arc<T> {
    async fn resolve(
        &self,
        source: &MediaSource,
        cookies: Option<&Path>,
        scratch_dir: &Path,
    ) -> Result<MediaHandle> {
        (**self).resolve(source, cookies, scratch_dir).await
    }
}

/// Resolver backed by yt-dlp and reqwest.
pub struct DefaultMediaResolver<E: CommandExecutor + 'static> {
    executor: Arc<E>,
    yt_dlp: String,
    http: reqwest::Client,
}

impl<E: CommandExecutor + 'static> DefaultMediaResolver<E> {
    pub fn new(executor: Arc<E>, yt_dlp: impl Into<String>) -> Self {
        Self {
            executor,
            yt_dlp: yt_dlp.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn resolve_local(&self, path: &Path, persistent: bool) -> Result<MediaHandle> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ScribeError::UnsupportedInput {
                path: path.display().to_string(),
                reason: format!("cannot read file: {}", e),
            })?;
        if !metadata.is_file() {
            return Err(ScribeError::UnsupportedInput {
                path: path.display().to_string(),
                reason: "not a regular file".to_string(),
            });
        }
        Ok(if persistent {
            MediaHandle::borrowed(path)
        } else {
            MediaHandle::owned(path)
        })
    }

    async fn resolve_with_yt_dlp(
        &self,
        url: &str,
        kind: SourceKind,
        cookies: Option<&Path>,
        scratch_dir: &Path,
    ) -> Result<MediaHandle> {
        let executor = Arc::clone(&self.executor);
        let program = self.yt_dlp.clone();
        let args = yt_dlp_args(url, kind, cookies, scratch_dir);
        let scratch = scratch_dir.to_path_buf();
        let source_ref = url.to_string();

        tracing::info!(url, %kind, "downloading with yt-dlp");
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let arg_refs: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();
            executor.execute(&program, &arg_refs)?;
            find_download(&scratch).ok_or_else(|| ScribeError::MediaResolve {
                source_ref,
                message: "yt-dlp finished but produced no file".to_string(),
            })
        })
        .await
        .map_err(|e| ScribeError::Other(format!("yt-dlp task failed: {}", e)))??;

        ensure_not_empty(url, &path).await?;
        Ok(MediaHandle::owned(path))
    }

    async fn download(&self, source_url: &str, fetch_url: &str, target: PathBuf) -> Result<MediaHandle> {
        let fail = |message: String| ScribeError::MediaResolve {
            source_ref: source_url.to_string(),
            message,
        };

        tracing::info!(url = fetch_url, target = %target.display(), "downloading");
        let response = self
            .http
            .get(fetch_url)
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(fail(format!("download failed with status {}", response.status())));
        }

        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&target).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fail(format!("failed to read download: {}", e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bytes = written, "download finished");
        ensure_not_empty(source_url, &target).await?;
        Ok(MediaHandle::owned(target))
    }
}

#[async_trait]
impl<E: CommandExecutor + 'static> MediaResolver for DefaultMediaResolver<E> {
    async fn resolve(
        &self,
        source: &MediaSource,
        cookies: Option<&Path>,
        scratch_dir: &Path,
    ) -> Result<MediaHandle> {
        let url = match source {
            MediaSource::LocalFile { path, persistent } => {
                return self.resolve_local(path, *persistent).await;
            }
            MediaSource::RemoteUrl { url } => url,
        };

        match classify_url(url) {
            kind @ (SourceKind::YouTube | SourceKind::LinkedIn) => {
                self.resolve_with_yt_dlp(url, kind, cookies, scratch_dir)
                    .await
            }
            SourceKind::GoogleDrive => {
                let fetch_url = drive_download_url(url).ok_or_else(|| ScribeError::MediaResolve {
                    source_ref: url.clone(),
                    message: "link does not contain a Google Drive file id".to_string(),
                })?;
                let target = scratch_dir.join(format!("{}.mp4", DOWNLOAD_STEM));
                self.download(url, &fetch_url, target).await
            }
            SourceKind::Direct => {
                let target = scratch_dir.join(direct_file_name(url));
                self.download(url, url, target).await
            }
        }
    }
}

fn yt_dlp_args(
    url: &str,
    kind: SourceKind,
    cookies: Option<&Path>,
    scratch_dir: &Path,
) -> Vec<OsString> {
    let template = scratch_dir.join(format!("{}.%(ext)s", DOWNLOAD_STEM));
    let mut args: Vec<OsString> = vec!["--no-playlist".into(), "--no-progress".into()];
    match kind {
        SourceKind::LinkedIn => {
            args.extend(["-f".into(), "best[ext=mp4]/best".into()]);
        }
        _ => {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
            ]);
        }
    }
    args.extend(["-o".into(), template.into_os_string()]);
    if let Some(cookies) = cookies {
        args.extend(["--cookies".into(), cookies.as_os_str().to_os_string()]);
    }
    args.push(url.into());
    args
}

/// First regular file named `download.*` in `dir`, skipping partial downloads.
fn find_download(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_stem().and_then(|s| s.to_str()) == Some(DOWNLOAD_STEM)
                && !matches!(extension_of(p).as_deref(), Some("part" | "ytdl"))
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

async fn ensure_not_empty(source_ref: &str, path: &Path) -> Result<()> {
    let size = tokio::fs::metadata(path).await?.len();
    if size == 0 {
        return Err(ScribeError::MediaResolve {
            source_ref: source_ref.to_string(),
            message: "downloaded file is empty".to_string(),
        });
    }
    Ok(())
}
