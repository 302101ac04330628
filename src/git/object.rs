//! git::object
//!
//! Parsers for raw git encodings.
//!
//! # Formats
//!
//! - Batch header: `<sha> <type> <size>` or `<spec> missing`
//! - Tree: repeated `<octal-mode> SP <name> NUL <20-byte sha>`
//! - Commit: `tree`, `parent`*, `author` headers, blank line, message
//! - Log: `git log --name-status --format=fuller --date=iso-strict`
//!
//! # Invariants
//!
//! - Parsers never default a missing mandatory field; they fail with
//!   [`GitError::Malformed`] quoting the offending bytes
//! - Tree entries are returned in encoded order, never re-sorted

use chrono::DateTime;

use super::error::GitError;
use crate::core::types::{ChangedFile, Commit, GitObject, LogEntry, ObjectId, ObjectKind};

/// Length of a binary object id inside a tree (SHA-1).
pub const RAW_SHA_LEN: usize = 20;

/// Parsed `<sha> <type> <size>` line from the batch helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub size: usize,
}

impl BatchHeader {
    /// Bytes that follow the header: the payload plus its newline.
    pub fn frame_len(&self) -> Result<usize, GitError> {
        self.size.checked_add(1).ok_or_else(|| {
            GitError::malformed(
                "batch header",
                "object size out of range",
                self.size.to_string().as_bytes(),
            )
        })
    }
}

/// A batch helper reply header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchReply {
    /// The object exists; `size` payload bytes and a newline follow.
    Found(BatchHeader),
    /// The requested spec did not resolve; nothing follows.
    Missing(String),
}

/// Parse one header line (without its trailing newline).
pub fn parse_batch_header(line: &[u8]) -> Result<BatchReply, GitError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| GitError::malformed("batch header", "not UTF-8", line))?;

    if let Some(spec) = text.strip_suffix(" missing") {
        return Ok(BatchReply::Missing(spec.to_string()));
    }
    if let Some(spec) = text.strip_suffix(" ambiguous") {
        return Ok(BatchReply::Missing(spec.to_string()));
    }

    let mut fields = text.split(' ');
    let (Some(sha), Some(kind), Some(size), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(GitError::malformed(
            "batch header",
            "expected '<sha> <type> <size>'",
            line,
        ));
    };

    let size = size
        .parse::<usize>()
        .map_err(|_| GitError::malformed("batch header", "size is not a number", line))?;

    Ok(BatchReply::Found(BatchHeader {
        id: ObjectId::new(sha)?,
        kind: kind.parse()?,
        size,
    }))
}

/// Parse a raw tree object into its entries.
///
/// # Example
///
/// ```
/// use gitfolio::git::object::parse_tree;
///
/// let mut raw = b"100644 index.html\0".to_vec();
/// raw.extend_from_slice(&[0x11; 20]);
/// let entries = parse_tree(&raw).unwrap();
/// assert_eq!(entries[0].name, "index.html");
/// assert_eq!(entries[0].sha.as_str(), "11".repeat(20));
///
/// assert!(parse_tree(&raw[..raw.len() - 1]).is_err());
/// ```
pub fn parse_tree(data: &[u8]) -> Result<Vec<crate::core::types::TreeEntry>, GitError> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let rest = &data[pos..];

        let mode_len = rest.iter().take_while(|b| (b'0'..=b'7').contains(b)).count();
        if mode_len == 0 {
            return Err(GitError::malformed("tree", "expected octal mode", rest));
        }
        if rest.get(mode_len) != Some(&b' ') {
            return Err(GitError::malformed("tree", "expected space after mode", rest));
        }
        let mode = String::from_utf8_lossy(&rest[..mode_len]).into_owned();

        let name_start = mode_len + 1;
        let name_len = rest[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GitError::malformed("tree", "unterminated entry name", rest))?;
        let name = String::from_utf8_lossy(&rest[name_start..name_start + name_len]).into_owned();

        let sha_start = name_start + name_len + 1;
        let sha_end = sha_start + RAW_SHA_LEN;
        if sha_end > rest.len() {
            return Err(GitError::malformed("tree", "truncated object id", rest));
        }

        entries.push(crate::core::types::TreeEntry {
            mode,
            name,
            sha: ObjectId::from_raw(&rest[sha_start..sha_end])?,
        });
        pos += sha_end;
    }

    Ok(entries)
}

/// Parse a raw commit object.
///
/// `tree` and `author` headers are mandatory. `parent` may appear any number
/// of times, and a single `parent` line may list several ids.
pub fn parse_commit(data: &[u8]) -> Result<Commit, GitError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| GitError::malformed("commit", "not UTF-8", data))?;

    let (headers, msg) = match text.find("\n\n") {
        Some(idx) => (&text[..idx], &text[idx + 2..]),
        None => (text, ""),
    };

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;

    for line in headers.lines() {
        if let Some(value) = line.strip_prefix("tree ") {
            tree = Some(ObjectId::new(value.trim())?);
        } else if let Some(value) = line.strip_prefix("parent ") {
            for id in value.split_whitespace() {
                parents.push(ObjectId::new(id)?);
            }
        } else if let Some(value) = line.strip_prefix("author ") {
            author = Some(parse_signature(value, data)?);
        }
    }

    let tree = tree.ok_or_else(|| GitError::malformed("commit", "missing tree header", data))?;
    let (author, date) =
        author.ok_or_else(|| GitError::malformed("commit", "missing author header", data))?;

    Ok(Commit {
        tree,
        parents,
        author,
        date,
        msg: msg.to_string(),
    })
}

/// Split `Name <email> <epoch-seconds> <tz>` into identity and timestamp.
fn parse_signature(value: &str, raw: &[u8]) -> Result<(String, i64), GitError> {
    let mut parts = value.rsplitn(3, ' ');
    let (Some(_tz), Some(seconds), Some(ident)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GitError::malformed("commit", "incomplete author line", raw));
    };
    let seconds = seconds
        .parse::<i64>()
        .map_err(|_| GitError::malformed("commit", "author timestamp is not a number", raw))?;
    Ok((ident.to_string(), seconds))
}

/// Assemble a [`GitObject`], parsing trees and commits.
pub fn decode_object(header: BatchHeader, data: Vec<u8>) -> Result<GitObject, GitError> {
    let tree = match header.kind {
        ObjectKind::Tree => Some(parse_tree(&data)?),
        _ => None,
    };
    let commit = match header.kind {
        ObjectKind::Commit => Some(parse_commit(&data)?),
        _ => None,
    };

    Ok(GitObject {
        id: header.id,
        kind: header.kind,
        data,
        tree,
        commit,
    })
}

/// Parse `git log --name-status --format=fuller --date=iso-strict` output.
///
/// An entry starts at each `commit <sha>` line and is finalized at the next
/// one or at end of input.
pub fn parse_log(text: &str) -> Result<Vec<LogEntry>, GitError> {
    let mut entries = Vec::new();
    let mut current: Option<LogEntry> = None;

    for line in text.lines() {
        if let Some(body) = line.strip_prefix("    ") {
            if let Some(entry) = current.as_mut() {
                if !entry.msg.is_empty() {
                    entry.msg.push('\n');
                }
                entry.msg.push_str(body);
            }
        } else if let Some(rest) = line.strip_prefix("commit ") {
            if let Some(done) = current.take() {
                entries.push(done);
            }
            let sha = rest.split_whitespace().next().unwrap_or_default();
            current = Some(LogEntry {
                id: ObjectId::new(sha)?,
                author: String::new(),
                date: None,
                files: Vec::new(),
                msg: String::new(),
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(value) = line.strip_prefix("Author:") {
                entry.author = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("AuthorDate:") {
                entry.date = DateTime::parse_from_rfc3339(value.trim()).ok();
            } else if let Some(change) = parse_status_line(line) {
                entry.files.push(change);
            }
        }
    }

    if let Some(done) = current.take() {
        entries.push(done);
    }

    Ok(entries)
}

/// Parse `<status>\t<path>` (or `<status>\t<old>\t<new>` for renames).
fn parse_status_line(line: &str) -> Option<ChangedFile> {
    let mut fields = line.split('\t');
    let status = fields.next()?;
    let first = status.chars().next()?;
    if !first.is_ascii_uppercase() || !status[1..].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let path = fields.last()?;
    Some(ChangedFile {
        status: status.to_string(),
        path: unquote_path(path),
    })
}

/// Undo git's C-style quoting of unusual path names (`core.quotePath`).
///
/// Unquoted input is returned as is; octal escapes are UTF-8 bytes.
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let Some((&esc, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        match esc {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            b'0'..=b'3' if rest.len() >= 2 && is_octal(rest[0]) && is_octal(rest[1]) => {
                bytes.push(((esc - b'0') << 6) | ((rest[0] - b'0') << 3) | (rest[1] - b'0'));
                rest = &rest[2..];
            }
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn is_octal(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}
