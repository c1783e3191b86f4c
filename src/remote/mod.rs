//! Remote repository access through a content-addressable tree API.
//!
//! The [`RemoteRepository`] trait defines the six request/response calls a
//! batch commit needs. Each call is a single round trip, carries the caller's
//! [`Credential`], and keeps no state between calls.
//!
//! | Call | Purpose |
//! |---|---|
//! | [`branch_head`](RemoteRepository::branch_head) | Branch → head commit → root tree |
//! | [`create_blob`](RemoteRepository::create_blob) | Upload file content, get its sha |
//! | [`create_tree`](RemoteRepository::create_tree) | Layer adds/deletes onto a base tree |
//! | [`create_commit`](RemoteRepository::create_commit) | Single-parent commit of a tree |
//! | [`update_ref`](RemoteRepository::update_ref) | Fast-forward a branch to a commit |
//! | [`list_folder`](RemoteRepository::list_folder) | Immediate files under a path |
//!
//! Implementations:
//! - [`GitHubClient`](github::GitHubClient): JSON over HTTPS against the GitHub REST API.
//! - [`InMemoryRemote`](memory::InMemoryRemote): content-addressed bookkeeping in memory,
//!   with call recording and failure injection for exercising the commit sequence.

pub mod github;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// File mode for every blob entry written by this crate (regular, non-executable).
pub const FILE_MODE: &str = "100644";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Branch or commit does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The remote rejected a create or update call.
    #[error("remote rejected write: {0}")]
    Write(String),
    /// The branch moved since its head was read (non-fast-forward update).
    #[error("branch moved: {0}")]
    Conflict(String),
    /// Any other non-success response to a read.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Network failure, timeout, or an unreadable response body.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// The message as reported by the remote (or the transport).
    pub fn message(&self) -> &str {
        match self {
            RemoteError::NotFound(m)
            | RemoteError::Write(m)
            | RemoteError::Conflict(m)
            | RemoteError::Transport(m) => m,
            RemoteError::Api { message, .. } => message,
        }
    }
}

/// Repository coordinates parsed from `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("repository must be in owner/repo form, got '{0}'")]
pub struct InvalidRepoRef(pub String);

impl FromStr for RepoRef {
    type Err = InvalidRepoRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None)
                if is_valid_segment(owner) && is_valid_segment(name) =>
            {
                Ok(Self::new(owner, name.trim_end_matches(".git")))
            }
            _ => Err(InvalidRepoRef(s.to_string())),
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.chars().any(|c| c.is_whitespace() || c == '\\')
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Access token attached to every remote call. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// A branch's head commit and that commit's root tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub commit_sha: String,
    pub tree_sha: String,
}

/// One path change layered onto a base tree.
///
/// `sha: None` removes the path; `Some` points it at an existing blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub path: String,
    pub sha: Option<String>,
}

impl TreeChange {
    pub fn upsert(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha: Some(sha.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha: None,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.sha.is_none()
    }

    pub fn mode(&self) -> &'static str {
        FILE_MODE
    }
}

/// A file listed under a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub path: String,
    pub download_url: Option<String>,
    pub sha: String,
}

/// The calls a batch commit makes against a hosted repository.
///
/// `Sync` so blob uploads can fan out across worker threads.
pub trait RemoteRepository: Sync {
    /// Resolve `branch` to its head commit and that commit's root tree.
    fn branch_head(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<BranchHead, RemoteError>;

    /// Upload raw content and return its content-addressed sha.
    fn create_blob(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        content: &[u8],
    ) -> Result<String, RemoteError>;

    /// Layer `changes` onto `base_tree` and return the new tree sha.
    fn create_tree(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        base_tree: &str,
        changes: &[TreeChange],
    ) -> Result<String, RemoteError>;

    /// Create a single-parent commit and return its sha.
    fn create_commit(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        tree: &str,
        parent: &str,
        message: &str,
    ) -> Result<String, RemoteError>;

    /// Fast-forward `branch` to `commit`. Never forces.
    fn update_ref(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
        commit: &str,
    ) -> Result<(), RemoteError>;

    /// List the files (not subfolders) directly under `folder` at `branch`.
    ///
    /// A missing folder is an empty list, not an error.
    fn list_folder(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
        folder: &str,
    ) -> Result<Vec<FolderEntry>, RemoteError>;
}
