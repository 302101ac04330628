//! git::batch
//!
//! Long-lived `git cat-file --batch` helper.
//!
//! # Architecture
//!
//! The helper is spawned lazily on the first request. A reader task copies
//! its stdout into a [`ResultBuffer`] chunk by chunk; requests write one spec
//! line to stdin and then shift chunks until a full reply is assembled.
//! Bytes that arrive past the end of a reply stay in a carry buffer for the
//! next request.
//!
//! # Invariants
//!
//! - Callers serialize requests (the store runs them under the `cat-file`
//!   queue key); the helper never sees interleaved specs
//! - When the helper exits, its buffer is closed so pending and later
//!   requests fail with [`GitError::HelperReset`] instead of hanging
//! - Any error or timeout in the middle of a reply tears the helper down;
//!   the stream position is unknown after that and the next request spawns
//!   a fresh process

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::GitError;
use super::object::{parse_batch_header, BatchHeader, BatchReply};
use crate::core::tasks::queue::CAT_FILE;
use crate::core::tasks::{BufferError, ResultBuffer, SerialQueue};

const READ_CHUNK: usize = 64 * 1024;

type Output = ResultBuffer<Vec<u8>, std::io::Error>;

/// Handle to the batch helper process (spawned on demand).
pub struct CatFile {
    root: PathBuf,
    program: Vec<String>,
    timeout: Duration,
    helper: tokio::sync::Mutex<Option<Helper>>,
    last_used: Mutex<Instant>,
}

struct Helper {
    child: Child,
    stdin: ChildStdin,
    output: Arc<Output>,
    carry: Vec<u8>,
    exited: Arc<AtomicBool>,
}

impl std::fmt::Debug for CatFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatFile")
            .field("root", &self.root)
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CatFile {
    /// Helper running `git cat-file --batch` in `root`.
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_program(
            root,
            timeout,
            ["git", "cat-file", "--batch"].map(String::from).to_vec(),
        )
    }

    /// Helper running an arbitrary program speaking the batch protocol.
    pub fn with_program(root: impl Into<PathBuf>, timeout: Duration, program: Vec<String>) -> Self {
        Self {
            root: root.into(),
            program,
            timeout,
            helper: tokio::sync::Mutex::new(None),
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// Fetch the object `spec` resolves to (`<rev>:<path>` or an id).
    ///
    /// # Errors
    ///
    /// - [`GitError::NotFound`] if the helper answers `missing`
    /// - [`GitError::HelperReset`] if the helper exits mid-reply
    /// - [`GitError::Timeout`] if no full reply arrives in time
    pub async fn request(&self, spec: &str) -> Result<(BatchHeader, Vec<u8>), GitError> {
        if spec.is_empty() || spec.contains('\n') {
            return Err(GitError::InvalidPath {
                path: spec.to_string(),
                reason: "object spec must be a single non-empty line",
            });
        }

        let mut slot = self.helper.lock().await;
        if slot.as_ref().map_or(true, Helper::has_exited) {
            if let Some(old) = slot.take() {
                old.teardown().await;
            }
            *slot = Some(self.spawn()?);
        }
        let Some(helper) = slot.as_mut() else {
            return Err(GitError::HelperReset);
        };

        let outcome = tokio::time::timeout(self.timeout, helper.exchange(spec)).await;
        self.touch();

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(spec, error = %err, "cat-file request failed; restarting helper");
                if let Some(old) = slot.take() {
                    old.teardown().await;
                }
                return Err(err);
            }
            Err(_) => {
                warn!(spec, timeout = ?self.timeout, "cat-file request timed out");
                if let Some(old) = slot.take() {
                    old.teardown().await;
                }
                return Err(GitError::Timeout {
                    command: "cat-file --batch".to_string(),
                });
            }
        };

        reply.ok_or_else(|| GitError::NotFound {
            spec: spec.to_string(),
        })
    }

    /// Whether a helper process is currently running.
    pub async fn is_running(&self) -> bool {
        self.helper
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.has_exited())
    }

    /// Stop the helper if it has been idle for at least `idle`.
    pub async fn reap_if_idle(&self, idle: Duration) {
        let mut slot = self.helper.lock().await;
        if slot.is_some() && self.idle_for() >= idle {
            if let Some(old) = slot.take() {
                old.teardown().await;
                info!("stopped idle cat-file helper");
            }
        }
    }

    /// Stop the helper unconditionally.
    pub async fn shutdown(&self) {
        if let Some(old) = self.helper.lock().await.take() {
            old.teardown().await;
        }
    }

    /// Periodically reap the helper under the `cat-file` queue key.
    ///
    /// The task holds only a weak reference and ends once the helper handle
    /// is dropped.
    pub fn start_idle_reaper(self: &Arc<Self>, queue: SerialQueue, idle: Duration) -> JoinHandle<()> {
        let weak: Weak<CatFile> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle.max(Duration::from_millis(10)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cat) = weak.upgrade() else {
                    break;
                };
                queue
                    .enqueue(CAT_FILE, async move { cat.reap_if_idle(idle).await })
                    .await;
            }
        })
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    fn spawn(&self) -> Result<Helper, GitError> {
        let (program, args) = self.program.split_first().ok_or_else(|| GitError::InvalidPath {
            path: String::new(),
            reason: "batch helper program is empty",
        })?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(GitError::HelperReset)?;
        let mut stdout = child.stdout.take().ok_or(GitError::HelperReset)?;
        let stderr = child.stderr.take();

        let output: Arc<Output> = Arc::new(ResultBuffer::new());
        let exited = Arc::new(AtomicBool::new(false));

        {
            let output = output.clone();
            let exited = exited.clone();
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match stdout.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => output.push(chunk[..n].to_vec()),
                        Err(err) => {
                            output.push_error(err);
                            break;
                        }
                    }
                }
                exited.store(true, Ordering::SeqCst);
                output.close();
                debug!("cat-file helper stdout closed");
            });
        }

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(%line, "cat-file helper stderr");
                }
            });
        }

        debug!(root = %self.root.display(), pid = ?child.id(), "spawned cat-file helper");

        Ok(Helper {
            child,
            stdin,
            output,
            carry: Vec::new(),
            exited,
        })
    }
}

impl Helper {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Send one spec and read its reply; `None` means `missing`.
    async fn exchange(&mut self, spec: &str) -> Result<Option<(BatchHeader, Vec<u8>)>, GitError> {
        self.stdin.write_all(spec.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        let line = self.read_line().await?;
        let header = match parse_batch_header(&line)? {
            BatchReply::Missing(_) => return Ok(None),
            BatchReply::Found(header) => header,
        };

        self.fill(header.frame_len()?).await?;
        let data: Vec<u8> = self.carry.drain(..header.size).collect();
        if self.carry.first() != Some(&b'\n') {
            return Err(GitError::malformed(
                "batch reply",
                "object not followed by newline",
                &self.carry,
            ));
        }
        self.carry.drain(..1);

        Ok(Some((header, data)))
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, GitError> {
        loop {
            if let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.carry.drain(..=pos).collect();
                line.pop();
                return Ok(line);
            }
            self.pull_chunk().await?;
        }
    }

    async fn fill(&mut self, len: usize) -> Result<(), GitError> {
        while self.carry.len() < len {
            self.pull_chunk().await?;
        }
        Ok(())
    }

    async fn pull_chunk(&mut self) -> Result<(), GitError> {
        match self.output.shift().await {
            Ok(chunk) => {
                self.carry.extend_from_slice(&chunk);
                Ok(())
            }
            Err(BufferError::Reset) => Err(GitError::HelperReset),
            Err(BufferError::Failed(err)) => Err(GitError::Io(err)),
        }
    }

    async fn teardown(mut self) {
        self.output.close();
        if let Err(err) = self.child.kill().await {
            debug!(error = %err, "cat-file helper already gone");
        }
    }
}
