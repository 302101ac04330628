//! git::store
//!
//! The object store: every read and write of repository content.
//!
//! # Architecture
//!
//! [`ObjectStore`] is a cheap-to-clone handle over shared state:
//!
//! - a [`SerialQueue`] with three keys: `commit` (writes and HEAD
//!   refreshes), `cat-file` (batch helper requests and idle reaping) and
//!   `log` (history queries)
//! - the [`CatFile`] batch helper for content-addressed reads
//! - a [`GitRunner`] for one-shot commands (add, commit, push, pull, log)
//! - the cached HEAD revision, refreshed when older than
//!   [`StoreSettings::head_refresh`] and after every write
//!
//! [`ObjectStore::replace_text_file`] checks the committed content and
//! writes under the same `commit` slot, for read-modify-write callers.
//!
//! Reads and writes are not ordered against each other. A read racing a
//! write may see the pre-write revision until the write's own refresh
//! lands.
//!
//! # Plain Directory Mode
//!
//! Without version control the store reads and writes the directory
//! directly: no commits, no push, and an empty history.
//!
//! # Example
//!
//! ```no_run
//! use gitfolio::git::{ObjectStore, StoreSettings};
//!
//! # async fn demo() -> Result<(), gitfolio::git::GitError> {
//! let store = ObjectStore::open(StoreSettings::new("/srv/site")).await?;
//! let html = store.get_text_file("index.html", "HEAD").await?;
//! store.set_text_file("index.html", &html.replace("Hello", "Hi"), "Greet").await?;
//! store.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::batch::CatFile;
use super::command::GitRunner;
use super::error::GitError;
use super::object::{decode_object, parse_log};
use crate::core::tasks::queue::{CAT_FILE, COMMIT, LOG};
use crate::core::tasks::SerialQueue;
use crate::core::types::{GitObject, LogEntry, ObjectId, ObjectKind};

/// Upper bound on `-1`, `-2`, ... suffixes tried for an upload name.
const MAX_NAME_SUFFIX: usize = 10_000;

/// Settings the store runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Repository (or plain directory) root
    pub root: PathBuf,
    /// Serve the directory without version control
    pub plain_directory: bool,
    /// Remote to pull from and push to
    pub remote: String,
    /// Maximum age of the cached HEAD before a read refreshes it
    pub head_refresh: Duration,
    /// Whether a HEAD refresh pulls first
    pub pull_on_refresh: bool,
    /// Timeout for every subprocess call and helper request
    pub command_timeout: Duration,
    /// Idle time after which the batch helper is stopped
    pub batch_idle: Duration,
    /// Maximum entries returned by [`ObjectStore::log`]
    pub log_max_entries: usize,
}

impl StoreSettings {
    /// Default settings for a git repository at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plain_directory: false,
            remote: "origin".to_string(),
            head_refresh: Duration::from_secs(120),
            pull_on_refresh: true,
            command_timeout: Duration::from_secs(60),
            batch_idle: Duration::from_secs(15),
            log_max_entries: 50,
        }
    }
}

#[derive(Debug, Default)]
struct HeadCache {
    root_id: Option<ObjectId>,
    refreshed_at: Option<Instant>,
}

struct Inner {
    settings: StoreSettings,
    queue: SerialQueue,
    git: GitRunner,
    cat: Arc<CatFile>,
    head: Mutex<HeadCache>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            reaper.abort();
        }
    }
}

/// Handle to one repository's content.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl ObjectStore {
    /// Open the store and start the batch helper's idle reaper.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::Repository`] if `root` is not a git repository
    /// (outside plain directory mode).
    pub async fn open(settings: StoreSettings) -> Result<Self, GitError> {
        if !settings.plain_directory {
            git2::Repository::open(&settings.root)
                .map_err(|e| GitError::from_git2(e, &settings.root))?;
        }

        let queue = SerialQueue::new();
        let git = GitRunner::new(&settings.root, settings.command_timeout);
        let cat = Arc::new(CatFile::new(&settings.root, settings.command_timeout));

        let reaper = if settings.plain_directory {
            None
        } else {
            Some(cat.start_idle_reaper(queue.clone(), settings.batch_idle))
        };

        debug!(
            root = %settings.root.display(),
            plain = settings.plain_directory,
            "opened object store"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                queue,
                git,
                cat,
                head: Mutex::new(HeadCache::default()),
                reaper: Mutex::new(reaper),
            }),
        })
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    pub fn root(&self) -> &Path {
        &self.inner.settings.root
    }

    pub fn is_plain_directory(&self) -> bool {
        self.inner.settings.plain_directory
    }

    /// Stop the reaper and the batch helper.
    pub async fn shutdown(&self) {
        if let Some(reaper) = lock(&self.inner.reaper).take() {
            reaper.abort();
        }
        self.inner.cat.shutdown().await;
        debug!(root = %self.root().display(), "object store shut down");
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read the blob at `path` as of `rev`.
    ///
    /// Uses the configured HEAD refresh window; see [`Self::get_file_within`].
    ///
    /// # Errors
    ///
    /// [`GitError::NotFound`] if the path does not exist at `rev` or is
    /// not a blob.
    pub async fn get_file(&self, path: &str, rev: &str) -> Result<Vec<u8>, GitError> {
        self.get_file_within(path, rev, self.inner.settings.head_refresh)
            .await
    }

    /// Read the blob at `path` as of `rev`, refreshing the cached HEAD first
    /// if it is older than `max_age`.
    ///
    /// `HEAD` resolves to the cached revision; other revisions are passed to
    /// git as given, after the same refresh.
    pub async fn get_file_within(
        &self,
        path: &str,
        rev: &str,
        max_age: Duration,
    ) -> Result<Vec<u8>, GitError> {
        let path = normalize_repo_path(path)?;

        if self.is_plain_directory() {
            return match tokio::fs::read(self.root().join(&path)).await {
                Ok(bytes) => Ok(bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(GitError::NotFound { spec: path })
                }
                Err(err) => Err(err.into()),
            };
        }

        let head = self.head_within(max_age).await?;
        let rev = if rev == "HEAD" {
            match head {
                Some(id) => id.to_string(),
                None => {
                    return Err(GitError::NotFound {
                        spec: format!("HEAD:{}", path),
                    })
                }
            }
        } else {
            rev.to_string()
        };

        let spec = format!("{}:{}", rev, path);
        let (header, data) = self.cat(spec.clone()).await?;
        if header.kind != ObjectKind::Blob {
            return Err(GitError::NotFound { spec });
        }
        Ok(data)
    }

    /// Read the blob at `path` as UTF-8 text.
    pub async fn get_text_file(&self, path: &str, rev: &str) -> Result<String, GitError> {
        let bytes = self.get_file(path, rev).await?;
        String::from_utf8(bytes)
            .map_err(|e| GitError::malformed("text file", "not valid UTF-8", e.as_bytes()))
    }

    /// Read any object by spec (`<rev>:<path>` or an object id), with trees
    /// and commits parsed.
    pub async fn read_object(&self, spec: &str) -> Result<GitObject, GitError> {
        if self.is_plain_directory() {
            return Err(GitError::NotFound {
                spec: spec.to_string(),
            });
        }
        let (header, data) = self.cat(spec.to_string()).await?;
        decode_object(header, data)
    }

    /// The cached HEAD commit, refreshed if older than the refresh interval.
    ///
    /// `None` for a repository without commits.
    pub async fn head(&self) -> Result<Option<ObjectId>, GitError> {
        self.head_within(self.inner.settings.head_refresh).await
    }

    /// The cached HEAD commit, refreshed if older than `max_age`.
    ///
    /// Always `None` in plain-directory mode.
    pub async fn head_within(&self, max_age: Duration) -> Result<Option<ObjectId>, GitError> {
        if self.is_plain_directory() {
            return Ok(None);
        }
        if let Some(id) = self.fresh_head(max_age) {
            return Ok(Some(id));
        }
        let store = self.clone();
        self.inner
            .queue
            .enqueue(COMMIT, async move {
                // Another caller may have refreshed while we waited.
                if let Some(id) = store.fresh_head(max_age) {
                    return Ok(Some(id));
                }
                store.refresh_head().await
            })
            .await
    }

    /// Pull (if configured) and re-resolve HEAD now.
    pub async fn refresh(&self) -> Result<Option<ObjectId>, GitError> {
        let store = self.clone();
        self.inner
            .queue
            .enqueue(COMMIT, async move { store.refresh_head().await })
            .await
    }

    async fn cat(&self, spec: String) -> Result<(super::object::BatchHeader, Vec<u8>), GitError> {
        let cat = self.inner.cat.clone();
        self.inner
            .queue
            .enqueue(CAT_FILE, async move { cat.request(&spec).await })
            .await
    }

    fn fresh_head(&self, max_age: Duration) -> Option<ObjectId> {
        let head = lock(&self.inner.head);
        match (&head.root_id, head.refreshed_at) {
            (Some(id), Some(at)) if at.elapsed() < max_age => {
                Some(id.clone())
            }
            _ => None,
        }
    }

    /// Runs under the `commit` key.
    async fn refresh_head(&self) -> Result<Option<ObjectId>, GitError> {
        if self.inner.settings.pull_on_refresh && self.has_remote()? {
            if let Err(err) = self.pull().await {
                warn!(error = %err, "pull during HEAD refresh failed; using local HEAD");
            }
        }
        self.store_local_head()
    }

    fn store_local_head(&self) -> Result<Option<ObjectId>, GitError> {
        let id = self.resolve_local_head()?;
        let mut head = lock(&self.inner.head);
        if head.root_id != id {
            debug!(head = ?id.as_ref().map(|i| i.short(8).to_string()), "HEAD refreshed");
        }
        head.root_id = id.clone();
        head.refreshed_at = Some(Instant::now());
        Ok(id)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write `bytes` to `path`, then commit and push.
    ///
    /// Writes are totally ordered. If the push is rejected the store pulls
    /// (preferring local changes) and pushes once more.
    ///
    /// # Errors
    ///
    /// [`GitError::PushRejected`] if the retry fails too. The commit stays
    /// in the local repository in that case.
    pub async fn set_bin_file(&self, path: &str, bytes: &[u8], message: &str) -> Result<(), GitError> {
        let path = normalize_repo_path(path)?;
        let store = self.clone();
        let bytes = bytes.to_vec();
        let message = message.to_string();
        self.inner
            .queue
            .enqueue(COMMIT, async move {
                store.write_and_commit(&path, &bytes, &message).await
            })
            .await
    }

    /// Write UTF-8 text to `path` only if its committed content is still
    /// `expected` (`None`: the file must not exist yet).
    ///
    /// The check and the write run as one step under the `commit` key, so a
    /// read-modify-write built on this never loses a concurrent update.
    ///
    /// # Errors
    ///
    /// [`GitError::Stale`] if another write changed the file first.
    pub async fn replace_text_file(
        &self,
        path: &str,
        expected: Option<&str>,
        content: &str,
        message: &str,
    ) -> Result<(), GitError> {
        let path = normalize_repo_path(path)?;
        let store = self.clone();
        let expected = expected.map(|e| e.as_bytes().to_vec());
        let content = content.as_bytes().to_vec();
        let message = message.to_string();
        self.inner
            .queue
            .enqueue(COMMIT, async move {
                if store.committed_bytes(&path).await? != expected {
                    debug!(path = %path, "conditional write lost a race");
                    return Err(GitError::Stale { path });
                }
                store.write_and_commit(&path, &content, &message).await
            })
            .await
    }

    /// Write UTF-8 text to `path`, then commit and push.
    pub async fn set_text_file(&self, path: &str, content: &str, message: &str) -> Result<(), GitError> {
        self.set_bin_file(path, content.as_bytes(), message).await
    }

    /// Store an uploaded file under `dir`, reusing an identical existing file.
    ///
    /// Returns the repository-relative path of the stored file. A new file
    /// is named `<base>.<ext>`, or `<base>-1.<ext>`, `<base>-2.<ext>`, ...
    /// when taken.
    pub async fn create_bin_file(
        &self,
        dir: &str,
        base: &str,
        ext: &str,
        bytes: &[u8],
        message: &str,
    ) -> Result<String, GitError> {
        if base.is_empty() || base.contains('/') || ext.contains('/') {
            return Err(GitError::InvalidPath {
                path: format!("{}.{}", base, ext),
                reason: "upload name must be a single path component",
            });
        }
        let dir = normalize_dir(dir)?;
        let abs_dir = self.root().join(&dir);
        tokio::fs::create_dir_all(&abs_dir).await?;

        if let Some(existing) = find_identical(&abs_dir, bytes).await? {
            let path = join_repo_path(&dir, &existing);
            info!(%path, "upload matches existing file");
            return Ok(path);
        }

        let name = reserve_name(&abs_dir, base, ext, bytes).await?;
        let path = join_repo_path(&dir, &name);
        self.set_bin_file(&path, bytes, message).await?;
        Ok(path)
    }

    /// Content of `path` as of the last write. Runs under the `commit` key.
    async fn committed_bytes(&self, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        if self.is_plain_directory() {
            return match tokio::fs::read(self.root().join(path)).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            };
        }
        let Some(head) = self.resolve_local_head()? else {
            return Ok(None);
        };
        match self.cat(format!("{}:{}", head, path)).await {
            Ok((header, data)) if header.kind == ObjectKind::Blob => Ok(Some(data)),
            Ok(_) => Ok(None),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Runs under the `commit` key.
    async fn write_and_commit(&self, path: &str, bytes: &[u8], message: &str) -> Result<(), GitError> {
        let full = self.root().join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        if self.is_plain_directory() {
            debug!(path, "wrote file (plain directory)");
            return Ok(());
        }

        let git = &self.inner.git;
        git.run(&["add", "--", path]).await?;
        if git.succeeds(&["diff", "--cached", "--quiet", "--", path]).await? {
            debug!(path, "content unchanged; nothing to commit");
            return Ok(());
        }
        git.run(&["commit", "-q", "-m", message, "--", path]).await?;
        info!(path, message, "committed");

        let pushed = if self.has_remote()? {
            self.push_with_retry().await
        } else {
            Ok(())
        };

        self.store_local_head()?;
        pushed
    }

    async fn push_with_retry(&self) -> Result<(), GitError> {
        let remote = self.inner.settings.remote.as_str();
        let git = &self.inner.git;

        match git.run(&["push", "-q", remote, "HEAD"]).await {
            Ok(_) => {
                info!(remote, "pushed");
                return Ok(());
            }
            Err(err) if err.is_retryable() => {
                warn!(remote, error = %err, "push failed; pulling and retrying once");
            }
            Err(err) => return Err(err),
        }

        if let Err(err) = self.pull().await {
            return Err(GitError::PushRejected {
                stderr: failure_text(err),
            });
        }

        match git.run(&["push", "-q", remote, "HEAD"]).await {
            Ok(_) => {
                info!(remote, "pushed after pull");
                Ok(())
            }
            Err(err) if err.is_retryable() => Err(GitError::PushRejected {
                stderr: failure_text(err),
            }),
            Err(err) => Err(err),
        }
    }

    /// Merge the remote branch, preferring local changes on conflict.
    async fn pull(&self) -> Result<(), GitError> {
        let remote = self.inner.settings.remote.clone();
        let mut args = vec![
            "pull", "-q", "--no-rebase", "--no-edit", "-s", "recursive", "-X", "ours",
        ];
        args.push(&remote);
        let branch = self.current_branch()?;
        if let Some(branch) = branch.as_deref() {
            args.push(branch);
        }
        self.inner.git.run(&args).await?;
        debug!(remote = %remote, "pulled");
        Ok(())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// History of `path`, newest first, bounded by the configured maximum.
    pub async fn log(&self, path: &str) -> Result<Vec<LogEntry>, GitError> {
        if self.is_plain_directory() {
            return Ok(Vec::new());
        }
        let path = normalize_repo_path(path)?;
        let store = self.clone();
        self.inner
            .queue
            .enqueue(LOG, async move {
                if store.resolve_local_head()?.is_none() {
                    return Ok(Vec::new());
                }
                let max = store.inner.settings.log_max_entries.to_string();
                let out = store
                    .inner
                    .git
                    .run(&[
                        "log",
                        "--name-status",
                        "--format=fuller",
                        "--date=iso-strict",
                        "-n",
                        max.as_str(),
                        "--",
                        path.as_str(),
                    ])
                    .await?;
                parse_log(&out.text())
            })
            .await
    }

    // =========================================================================
    // Repository queries (git2)
    // =========================================================================

    fn open_repo(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::open(self.root()).map_err(|e| GitError::from_git2(e, self.root()))
    }

    fn resolve_local_head(&self) -> Result<Option<ObjectId>, GitError> {
        let repo = self.open_repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
                ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(GitError::from_git2(e, self.root())),
        };
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, self.root()))?;
        Ok(Some(ObjectId::new(commit.id().to_string())?))
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        let repo = self.open_repo()?;
        let branch = match repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().map(str::to_string),
            _ => None,
        };
        Ok(branch)
    }

    fn has_remote(&self) -> Result<bool, GitError> {
        let repo = self.open_repo()?;
        let found = repo.find_remote(&self.inner.settings.remote).is_ok();
        Ok(found)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn failure_text(err: GitError) -> String {
    match err {
        GitError::CommandFailed { stderr, .. } => stderr,
        other => other.to_string(),
    }
}

/// Normalize a repository-relative file path.
///
/// Leading slashes and `.` segments are dropped. `..` segments, empty
/// paths and paths into `.git` are rejected.
pub fn normalize_repo_path(path: &str) -> Result<String, GitError> {
    let normalized = normalize_dir(path)?;
    if normalized.is_empty() {
        return Err(GitError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty",
        });
    }
    Ok(normalized)
}

fn normalize_dir(path: &str) -> Result<String, GitError> {
    let reject = |reason| GitError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.contains(['\n', '\0', '\\']) {
        return Err(reject("path contains a forbidden character"));
    }

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(reject("path leaves the repository")),
            ".git" => return Err(reject("path points into git metadata")),
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

fn join_repo_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Name of a regular file in `dir` with exactly `bytes` as content.
async fn find_identical(dir: &Path, bytes: &[u8]) -> Result<Option<String>, GitError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if meta.is_file() && meta.len() == bytes.len() as u64 {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    // Directory order is unspecified; check candidates deterministically.
    names.sort();

    for name in names {
        if tokio::fs::read(dir.join(&name)).await? == bytes {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

/// Create the first free `<base>[-N].<ext>` in `dir` holding `bytes`.
async fn reserve_name(dir: &Path, base: &str, ext: &str, bytes: &[u8]) -> Result<String, GitError> {
    for n in 0..MAX_NAME_SUFFIX {
        let stem = if n == 0 {
            base.to_string()
        } else {
            format!("{}-{}", base, n)
        };
        let name = if ext.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, ext)
        };

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok(name);
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(GitError::InvalidPath {
        path: format!("{}.{}", base, ext),
        reason: "no free file name",
    })
}
