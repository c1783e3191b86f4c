//! In-memory [`RemoteRepository`] for tests and dry runs.
//!
//! Objects are content-addressed (SHA-256, truncated to 40 hex chars), trees
//! are flat `path → blob` maps, and branches are fast-forward-only pointers.
//! Every call is recorded so tests can assert on the exact request sequence,
//! and failures can be injected at each step.

use super::{
    BranchHead, Credential, FolderEntry, RemoteError, RemoteRepository, RepoRef, TreeChange,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    BranchHead { branch: String },
    CreateBlob { size: usize },
    CreateTree { base: String, changes: Vec<TreeChange> },
    CreateCommit { tree: String, parent: String, message: String },
    UpdateRef { branch: String, commit: String },
    ListFolder { branch: String, folder: String },
}

#[derive(Debug, Clone)]
struct StoredCommit {
    tree: String,
    parent: Option<String>,
    message: String,
}

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, StoredCommit>,
    branches: HashMap<String, String>,
    calls: Vec<RemoteCall>,
    blob_uploads: usize,
    fail_blob_upload: Option<usize>,
    fail_tree: bool,
    race_ref_update: bool,
}

/// A single repository held in memory. Ignores the repository coordinates.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
}

fn object_id(kind: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    let hex = format!("{:x}", hasher.finalize());
    hex[..40].to_string()
}

fn tree_id(entries: &BTreeMap<String, String>) -> String {
    let mut listing = Vec::new();
    for (path, sha) in entries {
        listing.extend_from_slice(path.as_bytes());
        listing.push(0);
        listing.extend_from_slice(sha.as_bytes());
        listing.push(b'\n');
    }
    object_id("tree", &listing)
}

impl State {
    fn store_tree(&mut self, entries: BTreeMap<String, String>) -> String {
        let id = tree_id(&entries);
        self.trees.insert(id.clone(), entries);
        id
    }

    fn store_commit(&mut self, tree: &str, parent: Option<&str>, message: &str) -> String {
        let mut payload = format!("tree {tree}\n");
        if let Some(parent) = parent {
            payload.push_str(&format!("parent {parent}\n"));
        }
        payload.push_str(message);
        let id = object_id("commit", payload.as_bytes());
        self.commits.insert(
            id.clone(),
            StoredCommit {
                tree: tree.to_string(),
                parent: parent.map(str::to_string),
                message: message.to_string(),
            },
        );
        id
    }

    /// Whether `ancestor` is reachable from `commit` through parent links.
    fn descends_from(&self, commit: &str, ancestor: &str) -> bool {
        let mut cursor = Some(commit.to_string());
        while let Some(sha) = cursor {
            if sha == ancestor {
                return true;
            }
            cursor = self.commits.get(&sha).and_then(|c| c.parent.clone());
        }
        false
    }

    fn head_entries(&self, branch: &str) -> Option<&BTreeMap<String, String>> {
        let commit = self.branches.get(branch)?;
        let tree = &self.commits.get(commit)?.tree;
        self.trees.get(tree)
    }
}

fn check_auth(auth: &Credential) -> Result<(), RemoteError> {
    if auth.is_empty() {
        return Err(RemoteError::Api {
            status: 401,
            message: "Requires authentication".into(),
        });
    }
    Ok(())
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote with one branch pointing at an empty root commit.
    pub fn with_branch(branch: &str) -> Self {
        let remote = Self::new();
        {
            let mut state = remote.lock();
            let tree = state.store_tree(BTreeMap::new());
            let commit = state.store_commit(&tree, None, "Initial commit");
            state.branches.insert(branch.to_string(), commit);
        }
        remote
    }

    /// Seed `path` with `content` on `branch` as a new commit.
    pub fn with_file(self, branch: &str, path: &str, content: &[u8]) -> Self {
        {
            let mut state = self.lock();
            let blob = object_id("blob", content);
            state.blobs.insert(blob.clone(), content.to_vec());
            let mut entries = state.head_entries(branch).cloned().unwrap_or_default();
            entries.insert(path.to_string(), blob);
            let parent = state.branches.get(branch).cloned();
            let tree = state.store_tree(entries);
            let commit = state.store_commit(&tree, parent.as_deref(), &format!("Add {path}"));
            state.branches.insert(branch.to_string(), commit);
        }
        self
    }

    /// Reject the `n`th blob upload (zero-based) with a write error.
    pub fn fail_blob_upload(self, n: usize) -> Self {
        self.lock().fail_blob_upload = Some(n);
        self
    }

    /// Reject every tree creation with a write error.
    pub fn fail_tree_creation(self) -> Self {
        self.lock().fail_tree = true;
        self
    }

    /// Move the branch ahead just before the next ref update lands, so the
    /// update is no longer a fast-forward.
    pub fn race_ref_update(self) -> Self {
        self.lock().race_ref_update = true;
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Files at the head of `branch`, path → content.
    pub fn files(&self, branch: &str) -> BTreeMap<String, Vec<u8>> {
        let state = self.lock();
        state
            .head_entries(branch)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(path, sha)| {
                        state.blobs.get(sha).map(|bytes| (path.clone(), bytes.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn head(&self, branch: &str) -> Option<String> {
        self.lock().branches.get(branch).cloned()
    }

    pub fn commit_message(&self, sha: &str) -> Option<String> {
        self.lock().commits.get(sha).map(|c| c.message.clone())
    }

    pub fn commit_parent(&self, sha: &str) -> Option<String> {
        self.lock().commits.get(sha).and_then(|c| c.parent.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteRepository for InMemoryRemote {
    fn branch_head(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        branch: &str,
    ) -> Result<BranchHead, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::BranchHead {
            branch: branch.to_string(),
        });
        check_auth(auth)?;
        let commit_sha = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("Branch not found".into()))?;
        let tree_sha = state
            .commits
            .get(&commit_sha)
            .map(|c| c.tree.clone())
            .ok_or_else(|| RemoteError::NotFound("Commit fetch failed".into()))?;
        Ok(BranchHead {
            commit_sha,
            tree_sha,
        })
    }

    fn create_blob(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        content: &[u8],
    ) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateBlob {
            size: content.len(),
        });
        check_auth(auth)?;
        let attempt = state.blob_uploads;
        state.blob_uploads += 1;
        if state.fail_blob_upload == Some(attempt) {
            return Err(RemoteError::Write("Blob creation failed".into()));
        }
        let sha = object_id("blob", content);
        state.blobs.insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    fn create_tree(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        base_tree: &str,
        changes: &[TreeChange],
    ) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateTree {
            base: base_tree.to_string(),
            changes: changes.to_vec(),
        });
        check_auth(auth)?;
        if state.fail_tree {
            return Err(RemoteError::Write("Tree creation failed".into()));
        }
        let mut entries = state
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| RemoteError::Write(format!("base tree {base_tree} does not exist")))?;
        for change in changes {
            match &change.sha {
                Some(sha) if !state.blobs.contains_key(sha) => {
                    return Err(RemoteError::Write(format!("blob {sha} does not exist")));
                }
                Some(sha) => {
                    entries.insert(change.path.clone(), sha.clone());
                }
                None => {
                    entries.remove(&change.path);
                }
            }
        }
        Ok(state.store_tree(entries))
    }

    fn create_commit(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        tree: &str,
        parent: &str,
        message: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateCommit {
            tree: tree.to_string(),
            parent: parent.to_string(),
            message: message.to_string(),
        });
        check_auth(auth)?;
        if !state.trees.contains_key(tree) {
            return Err(RemoteError::Write(format!("tree {tree} does not exist")));
        }
        if !state.commits.contains_key(parent) {
            return Err(RemoteError::Write(format!("parent {parent} does not exist")));
        }
        Ok(state.store_commit(tree, Some(parent), message))
    }

    fn update_ref(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        branch: &str,
        commit: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::UpdateRef {
            branch: branch.to_string(),
            commit: commit.to_string(),
        });
        check_auth(auth)?;

        let current = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("Not Found".into()))?;

        if std::mem::take(&mut state.race_ref_update) {
            let tree = state
                .commits
                .get(&current)
                .map(|c| c.tree.clone())
                .unwrap_or_default();
            let concurrent = state.store_commit(&tree, Some(&current), "Concurrent push");
            state.branches.insert(branch.to_string(), concurrent);
        }

        let current = state.branches.get(branch).cloned().unwrap_or(current);
        if !state.commits.contains_key(commit) {
            return Err(RemoteError::Write(format!("commit {commit} does not exist")));
        }
        if !state.descends_from(commit, &current) {
            return Err(RemoteError::Conflict("Update is not a fast forward".into()));
        }
        state.branches.insert(branch.to_string(), commit.to_string());
        Ok(())
    }

    fn list_folder(
        &self,
        auth: &Credential,
        _repo: &RepoRef,
        branch: &str,
        folder: &str,
    ) -> Result<Vec<FolderEntry>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ListFolder {
            branch: branch.to_string(),
            folder: folder.to_string(),
        });
        check_auth(auth)?;

        let folder = crate::naming::normalize_path(folder);
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };
        let Some(entries) = state.head_entries(branch) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .filter_map(|(path, sha)| {
                let rest = path.strip_prefix(&prefix)?;
                (!rest.contains('/')).then(|| FolderEntry {
                    path: path.clone(),
                    download_url: Some(format!("memory://{branch}/{path}")),
                    sha: sha.clone(),
                })
            })
            .collect())
    }
}
