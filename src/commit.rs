//! Batch commit orchestration.
//!
//! Turns a batch of image uploads and path deletions into exactly one commit
//! on a branch. Each batch walks a fixed sequence of stages:
//!
//! ```text
//! Validate → HeadResolved → BlobsCreated → TreeCreated → CommitCreated → RefUpdated
//!     └──────────── any failure ─────────────→ Failed(stage, cause)
//! ```
//!
//! The branch head read in `HeadResolved` is the base for every later step and
//! is never re-read. Transform + blob upload run on a bounded worker pool; the
//! resulting tree changes keep input order regardless of completion order, and
//! the first failure aborts the batch before any tree is created. Nothing
//! durable changes on the remote until the final ref update, which only ever
//! fast-forwards.
//!
//! ## Progress
//!
//! Every remote call is bracketed by [`CommitEvent`]s sent on an optional
//! channel; [`crate::output::format_commit_event`] renders them as log lines.
//!
//! ## Retrying
//!
//! Nothing is retried here. A caller that retries re-runs the whole batch,
//! which re-resolves the head. [`CommitError::is_retryable`] flags the one
//! failure where that is expected to help: the branch moved under us.

use crate::imaging::{TransformError, TransformSpec, prepare_upload};
use crate::naming::{normalize_path, output_file_name, remote_path};
use crate::remote::{BranchHead, Credential, RemoteError, RemoteRepository, RepoRef, TreeChange};
use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_MESSAGE: &str = "Upload images via imgcommit";
pub const DEFAULT_WORKERS: usize = 4;

/// Where a batch lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTarget {
    /// `owner/repo`
    pub repo: String,
    pub branch: String,
    /// Folder for uploaded files; empty means the repository root.
    pub folder: String,
}

/// One candidate image. Unselected items are carried but skipped.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub bytes: Vec<u8>,
    /// Local file name; the uploaded name keeps its stem.
    pub file_name: String,
    pub selected: bool,
}

impl UploadItem {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            selected: true,
        }
    }
}

/// One candidate deletion, by full repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    pub path: String,
    pub selected: bool,
}

impl DeleteItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            selected: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub target: CommitTarget,
    pub credential: Credential,
    pub uploads: Vec<UploadItem>,
    pub deletions: Vec<DeleteItem>,
    pub transform: TransformSpec,
    /// Replaces [`DEFAULT_MESSAGE`]; a timestamp is always appended.
    pub message: Option<String>,
    /// Upper bound on concurrent transform + upload workers.
    pub max_workers: usize,
}

impl CommitRequest {
    pub fn new(target: CommitTarget, credential: Credential) -> Self {
        Self {
            target,
            credential,
            uploads: Vec::new(),
            deletions: Vec::new(),
            transform: TransformSpec::default(),
            message: None,
            max_workers: DEFAULT_WORKERS,
        }
    }
}

/// Stages of a batch, in order. A failure is reported against the stage
/// that was being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Validate,
    HeadResolved,
    BlobsCreated,
    TreeCreated,
    CommitCreated,
    RefUpdated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validate => "validation",
            Stage::HeadResolved => "branch lookup",
            Stage::BlobsCreated => "blob upload",
            Stage::TreeCreated => "tree creation",
            Stage::CommitCreated => "commit creation",
            Stage::RefUpdated => "ref update",
        })
    }
}

#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("{name}: {source}")]
    Transform {
        name: String,
        source: TransformError,
    },
    #[error("{name}: {source}")]
    Upload { name: String, source: RemoteError },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Error, Debug)]
pub enum CommitError {
    /// Rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        source: StageFailure,
    },
}

impl CommitError {
    pub fn stage(&self) -> Stage {
        match self {
            CommitError::Validation(_) => Stage::Validate,
            CommitError::Stage { stage, .. } => *stage,
        }
    }

    /// True when re-running the batch from scratch can succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CommitError::Stage {
                stage: Stage::RefUpdated,
                source: StageFailure::Remote(RemoteError::Conflict(_)),
            }
        )
    }

    /// The remote's own message when there is one, otherwise a description
    /// of what failed.
    pub fn user_message(&self) -> String {
        match self {
            CommitError::Validation(message) => message.clone(),
            CommitError::Stage { source, .. } => match source {
                StageFailure::Remote(err) => err.message().to_string(),
                StageFailure::Upload { name, source } => format!("{name}: {}", source.message()),
                StageFailure::Transform { name, source } => format!("{name}: {source}"),
            },
        }
    }
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitEvent {
    ResolvingHead {
        branch: String,
    },
    HeadResolved {
        head: BranchHead,
    },
    /// Upload `index` (1-based) of `total` selected uploads started.
    ProcessingItem {
        index: usize,
        total: usize,
        name: String,
    },
    BlobCreated {
        path: String,
        sha: String,
        size: usize,
        dimensions: (u32, u32),
    },
    DeletionQueued {
        path: String,
    },
    CreatingTree {
        changes: usize,
    },
    TreeCreated {
        sha: String,
    },
    CreatingCommit,
    CommitCreated {
        sha: String,
    },
    UpdatingRef {
        branch: String,
    },
    RefUpdated {
        branch: String,
        commit: String,
        changes: usize,
    },
    /// Every item was unselected; the batch ends after head resolution.
    NothingToCommit,
    Failed {
        stage: Stage,
        message: String,
        retryable: bool,
    },
}

/// Result of a completed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Head the batch was built on.
    pub base: BranchHead,
    /// Adds in input order, then deletions in input order.
    pub changes: Vec<TreeChange>,
    /// New head, or `None` when there was nothing to commit.
    pub commit: Option<String>,
}

/// A selected upload with its resolved destination path.
struct PendingUpload<'a> {
    index: usize,
    item: &'a UploadItem,
    path: String,
}

/// Inputs checked before any network call.
struct Validated<'a> {
    repo: RepoRef,
    uploads: Vec<PendingUpload<'a>>,
    deletions: Vec<String>,
}

/// Run one batch against `remote`.
///
/// Events go to `events` when given; a dropped receiver is ignored.
pub fn commit_batch(
    remote: &impl RemoteRepository,
    request: &CommitRequest,
    events: Option<Sender<CommitEvent>>,
) -> Result<CommitOutcome, CommitError> {
    let emit = |event: CommitEvent| {
        if let Some(tx) = &events {
            let _ = tx.send(event);
        }
    };

    let result = validate(request).and_then(|validated| run(remote, request, validated, &emit));
    if let Err(err) = &result {
        warn!(stage = %err.stage(), error = %err, "batch failed");
        emit(CommitEvent::Failed {
            stage: err.stage(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        });
    }
    result
}

fn validate(request: &CommitRequest) -> Result<Validated<'_>, CommitError> {
    let target = &request.target;
    let repo: RepoRef = target
        .repo
        .parse()
        .map_err(|e: crate::remote::InvalidRepoRef| CommitError::Validation(e.to_string()))?;
    if target.branch.trim().is_empty() {
        return Err(CommitError::Validation("branch is required".into()));
    }
    if request.credential.is_empty() {
        return Err(CommitError::Validation("access token is required".into()));
    }
    if request.uploads.is_empty() && request.deletions.is_empty() {
        return Err(CommitError::Validation(
            "nothing requested: add at least one upload or deletion".into(),
        ));
    }

    let mut seen = HashSet::new();
    let mut uploads = Vec::new();
    for item in request.uploads.iter().filter(|item| item.selected) {
        let path = remote_path(
            &target.folder,
            &output_file_name(&item.file_name, request.transform.format),
        );
        if !seen.insert(path.clone()) {
            return Err(CommitError::Validation(format!(
                "two uploads resolve to the same path '{path}'"
            )));
        }
        uploads.push(PendingUpload {
            index: uploads.len() + 1,
            item,
            path,
        });
    }

    let mut deletions = Vec::new();
    for item in request.deletions.iter().filter(|item| item.selected) {
        let path = normalize_path(&item.path);
        if path.is_empty() {
            return Err(CommitError::Validation("delete path must not be empty".into()));
        }
        if !seen.insert(path.clone()) {
            return Err(CommitError::Validation(format!(
                "'{path}' is requested more than once"
            )));
        }
        deletions.push(path);
    }

    Ok(Validated {
        repo,
        uploads,
        deletions,
    })
}

fn run(
    remote: &impl RemoteRepository,
    request: &CommitRequest,
    validated: Validated<'_>,
    emit: &(impl Fn(CommitEvent) + Sync),
) -> Result<CommitOutcome, CommitError> {
    let Validated {
        repo,
        uploads,
        deletions,
    } = validated;
    let auth = &request.credential;
    let branch = request.target.branch.trim();
    let fail = |stage: Stage| move |source: StageFailure| CommitError::Stage { stage, source };

    // HeadResolved
    emit(CommitEvent::ResolvingHead {
        branch: branch.to_string(),
    });
    let base = remote
        .branch_head(auth, &repo, branch)
        .map_err(|e| fail(Stage::HeadResolved)(e.into()))?;
    info!(%repo, branch, commit = %base.commit_sha, "resolved branch head");
    emit(CommitEvent::HeadResolved { head: base.clone() });

    if uploads.is_empty() && deletions.is_empty() {
        info!("no selected items, nothing to commit");
        emit(CommitEvent::NothingToCommit);
        return Ok(CommitOutcome {
            base,
            changes: Vec::new(),
            commit: None,
        });
    }

    // BlobsCreated
    let total = uploads.len();
    let upload_one = |pending: &PendingUpload| -> Result<TreeChange, StageFailure> {
        let name = &pending.item.file_name;
        emit(CommitEvent::ProcessingItem {
            index: pending.index,
            total,
            name: name.clone(),
        });
        let encoded = prepare_upload(&pending.item.bytes, name, &request.transform).map_err(
            |source| StageFailure::Transform {
                name: name.clone(),
                source,
            },
        )?;
        let sha = remote
            .create_blob(auth, &repo, &encoded.bytes)
            .map_err(|source| StageFailure::Upload {
                name: name.clone(),
                source,
            })?;
        emit(CommitEvent::BlobCreated {
            path: pending.path.clone(),
            sha: sha.clone(),
            size: encoded.bytes.len(),
            dimensions: encoded.dimensions(),
        });
        Ok(TreeChange::upsert(pending.path.clone(), sha))
    };

    let uploaded: Result<Vec<TreeChange>, StageFailure> = match worker_pool(request.max_workers) {
        Some(pool) => pool.install(|| uploads.par_iter().map(upload_one).collect()),
        None => uploads.par_iter().map(upload_one).collect(),
    };
    let mut changes = uploaded.map_err(fail(Stage::BlobsCreated))?;
    info!(blobs = changes.len(), "created blobs");

    for path in deletions {
        emit(CommitEvent::DeletionQueued { path: path.clone() });
        changes.push(TreeChange::delete(path));
    }

    // TreeCreated
    emit(CommitEvent::CreatingTree {
        changes: changes.len(),
    });
    let tree = remote
        .create_tree(auth, &repo, &base.tree_sha, &changes)
        .map_err(|e| fail(Stage::TreeCreated)(e.into()))?;
    info!(%tree, changes = changes.len(), "created tree");
    emit(CommitEvent::TreeCreated { sha: tree.clone() });

    // CommitCreated
    emit(CommitEvent::CreatingCommit);
    let message = commit_message(request.message.as_deref(), Utc::now());
    let commit = remote
        .create_commit(auth, &repo, &tree, &base.commit_sha, &message)
        .map_err(|e| fail(Stage::CommitCreated)(e.into()))?;
    info!(%commit, "created commit");
    emit(CommitEvent::CommitCreated {
        sha: commit.clone(),
    });

    // RefUpdated
    emit(CommitEvent::UpdatingRef {
        branch: branch.to_string(),
    });
    remote
        .update_ref(auth, &repo, branch, &commit)
        .map_err(|e| fail(Stage::RefUpdated)(e.into()))?;
    info!(branch, %commit, "updated branch");
    emit(CommitEvent::RefUpdated {
        branch: branch.to_string(),
        commit: commit.clone(),
        changes: changes.len(),
    });

    Ok(CommitOutcome {
        base,
        changes,
        commit: Some(commit),
    })
}

/// Worker count: `requested` capped to the available cores, at least one.
pub fn effective_workers(requested: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.clamp(1, cores.max(1))
}

fn worker_pool(requested: usize) -> Option<rayon::ThreadPool> {
    let threads = effective_workers(requested);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("imgcommit-upload-{i}"))
        .build()
        .map_err(|e| warn!(error = %e, "falling back to the global thread pool"))
        .ok()
}

/// Caller message (or the default) with a UTC timestamp appended.
pub fn commit_message(custom: Option<&str>, now: DateTime<Utc>) -> String {
    let base = custom
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MESSAGE);
    format!(
        "{} – {}",
        base,
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
