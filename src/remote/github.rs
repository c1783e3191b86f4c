//! GitHub REST implementation of [`RemoteRepository`].
//!
//! Uses the Git Data API (`git/refs`, `git/commits`, `git/blobs`, `git/trees`)
//! for the commit sequence and the Contents API for folder listings.
//!
//! Every request carries:
//!
//! ```text
//! Authorization: Bearer <token>
//! Accept: application/vnd.github+json
//! X-GitHub-Api-Version: 2022-11-28
//! User-Agent: imgcommit/<version>
//! ```
//!
//! Write calls send JSON bodies (`Content-Type: application/json`). Path
//! segments (owner, repo, branch, folder) are percent-encoded one segment at a
//! time so names with spaces or `#` survive while `/` keeps separating segments.

use super::{
    BranchHead, Credential, FILE_MODE, FolderEntry, RemoteError, RemoteRepository, RepoRef,
    TreeChange,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("imgcommit/", env!("CARGO_PKG_VERSION"));

/// Which call a response belongs to; drives error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    ReadRef,
    ReadCommit,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    ListFolder,
}

impl Call {
    /// Used when the remote gives no `message` of its own.
    fn fallback_message(self) -> &'static str {
        match self {
            Call::ReadRef => "Branch not found",
            Call::ReadCommit => "Commit fetch failed",
            Call::CreateBlob => "Blob creation failed",
            Call::CreateTree => "Tree creation failed",
            Call::CreateCommit => "Commit failed",
            Call::UpdateRef => "Updating ref failed",
            Call::ListFolder => "Failed to list folder contents",
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaObject,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ShaObject,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

#[derive(Serialize)]
struct BlobRequest<'a> {
    content: String,
    encoding: &'a str,
}

#[derive(Serialize)]
struct TreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeEntry<'a>>,
}

/// `sha: null` is how the API expresses deletion, so it is always serialized.
#[derive(Serialize)]
struct TreeEntry<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct NewCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

#[derive(Serialize)]
struct RefUpdate<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
    download_url: Option<String>,
}

impl<'a> TreeRequest<'a> {
    fn new(base_tree: &'a str, changes: &'a [TreeChange]) -> Self {
        Self {
            base_tree,
            tree: changes
                .iter()
                .map(|change| TreeEntry {
                    path: &change.path,
                    mode: FILE_MODE,
                    kind: "blob",
                    sha: change.sha.as_deref(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Blocking GitHub API client. Holds no per-repository state.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: Url,
}

impl GitHubClient {
    /// Build a client against `api_base` (e.g. a GitHub Enterprise `/api/v3` URL).
    ///
    /// `timeout` bounds each whole request so a stalled call fails as a
    /// transport error instead of hanging.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| RemoteError::Transport(format!("invalid API base '{api_base}': {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!(
                "invalid API base '{api_base}': not a hierarchical URL"
            )));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { http, api_base })
    }

    /// `{api_base}/repos/{owner}/{repo}/{tail...}`, each segment percent-encoded.
    fn endpoint<'a>(&self, repo: &RepoRef, tail: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
                .extend(tail.into_iter().filter(|s| !s.is_empty()));
        }
        url
    }

    fn request(&self, method: Method, url: Url, auth: &Credential) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(auth.secret())
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send and read the body; status classification is left to the caller.
    fn execute(
        &self,
        call: Call,
        builder: RequestBuilder,
    ) -> Result<(StatusCode, String), RemoteError> {
        let response = builder.send().map_err(transport)?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().map_err(transport)?;
        debug!(?call, %url, status = status.as_u16(), bytes = body.len(), "github response");
        Ok((status, body))
    }

    /// Send, then decode a success body as `T` or classify the failure.
    fn call<T: DeserializeOwned>(
        &self,
        call: Call,
        builder: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let (status, body) = self.execute(call, builder)?;
        if !status.is_success() {
            return Err(classify(call, status, &body));
        }
        decode(&body)
    }
}

impl RemoteRepository for GitHubClient {
    fn branch_head(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<BranchHead, RemoteError> {
        let url = self.endpoint(repo, ["git", "ref", "heads"].into_iter().chain(branch.split('/')));
        let head: RefResponse = self.call(Call::ReadRef, self.request(Method::GET, url, auth))?;
        let commit_sha = head.object.sha;

        let url = self.endpoint(repo, ["git", "commits", commit_sha.as_str()]);
        let commit: CommitResponse =
            self.call(Call::ReadCommit, self.request(Method::GET, url, auth))?;

        Ok(BranchHead {
            commit_sha,
            tree_sha: commit.tree.sha,
        })
    }

    fn create_blob(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        content: &[u8],
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(repo, ["git", "blobs"]);
        let body = BlobRequest {
            content: BASE64.encode(content),
            encoding: "base64",
        };
        let created: ShaObject = self.call(
            Call::CreateBlob,
            self.request(Method::POST, url, auth).json(&body),
        )?;
        Ok(created.sha)
    }

    fn create_tree(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        base_tree: &str,
        changes: &[TreeChange],
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(repo, ["git", "trees"]);
        let body = TreeRequest::new(base_tree, changes);
        let created: ShaObject = self.call(
            Call::CreateTree,
            self.request(Method::POST, url, auth).json(&body),
        )?;
        Ok(created.sha)
    }

    fn create_commit(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        tree: &str,
        parent: &str,
        message: &str,
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(repo, ["git", "commits"]);
        let body = NewCommit {
            message,
            tree,
            parents: [parent],
        };
        let created: ShaObject = self.call(
            Call::CreateCommit,
            self.request(Method::POST, url, auth).json(&body),
        )?;
        Ok(created.sha)
    }

    fn update_ref(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
        commit: &str,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(
            repo,
            ["git", "refs", "heads"].into_iter().chain(branch.split('/')),
        );
        let body = RefUpdate {
            sha: commit,
            force: false,
        };
        let (status, body) = self.execute(
            Call::UpdateRef,
            self.request(Method::PATCH, url, auth).json(&body),
        )?;
        if !status.is_success() {
            return Err(classify(Call::UpdateRef, status, &body));
        }
        Ok(())
    }

    fn list_folder(
        &self,
        auth: &Credential,
        repo: &RepoRef,
        branch: &str,
        folder: &str,
    ) -> Result<Vec<FolderEntry>, RemoteError> {
        let folder = crate::naming::normalize_path(folder);
        let mut url = self.endpoint(repo, std::iter::once("contents").chain(folder.split('/')));
        url.query_pairs_mut().append_pair("ref", branch);

        let (status, body) = self.execute(Call::ListFolder, self.request(Method::GET, url, auth))?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(classify(Call::ListFolder, status, &body));
        }
        parse_folder_listing(&body)
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body)
        .map_err(|e| RemoteError::Transport(format!("unexpected response body: {e}")))
}

/// Map a non-success response to the error taxonomy, keeping the remote's message.
fn classify(call: Call, status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| call.fallback_message().to_string());

    match call {
        Call::ReadRef | Call::ReadCommit if status == StatusCode::NOT_FOUND => {
            RemoteError::NotFound(message)
        }
        Call::CreateBlob | Call::CreateTree | Call::CreateCommit => RemoteError::Write(message),
        Call::UpdateRef if status == StatusCode::CONFLICT => RemoteError::Conflict(message),
        Call::UpdateRef
            if status == StatusCode::UNPROCESSABLE_ENTITY && is_non_fast_forward(&message) =>
        {
            RemoteError::Conflict(message)
        }
        Call::UpdateRef
            if status == StatusCode::NOT_FOUND
                || message.to_ascii_lowercase().contains("does not exist") =>
        {
            RemoteError::NotFound(message)
        }
        Call::UpdateRef => RemoteError::Write(message),
        Call::ReadRef | Call::ReadCommit | Call::ListFolder => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// 422 is also used for a missing ref; only a rejected fast-forward is a race.
fn is_non_fast_forward(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("fast forward") || message.contains("fast-forward")
}

/// Contents API listing: an array for folders, an object for a single file.
fn parse_folder_listing(body: &str) -> Result<Vec<FolderEntry>, RemoteError> {
    let value: serde_json::Value = decode(body)?;
    if !value.is_array() {
        return Ok(Vec::new());
    }
    let items: Vec<ContentItem> = serde_json::from_value(value)
        .map_err(|e| RemoteError::Transport(format!("unexpected listing body: {e}")))?;
    Ok(items
        .into_iter()
        .filter(|item| item.kind == "file")
        .map(|item| FolderEntry {
            path: item.path,
            download_url: item.download_url,
            sha: item.sha,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;

    fn client() -> GitHubClient {
        GitHubClient::new(DEFAULT_API_BASE, Duration::from_secs(5)).unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef::new("octocat", "Hello-World")
    }

    // =========================================================================
    // URL construction
    // =========================================================================

    #[test]
    fn endpoint_joins_repo_and_tail() {
        let url = client().endpoint(&repo(), ["git", "blobs"]);
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octocat/Hello-World/git/blobs"
        );
    }

    #[test]
    fn endpoint_percent_encodes_each_segment() {
        let folder = "my photos/2024 #1";
        let url = client().endpoint(&repo(), std::iter::once("contents").chain(folder.split('/')));
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octocat/Hello-World/contents/my%20photos/2024%20%231"
        );
    }

    #[test]
    fn endpoint_keeps_api_base_prefix() {
        let client =
            GitHubClient::new("https://ghe.example.com/api/v3/", Duration::from_secs(5)).unwrap();
        let url = client.endpoint(&repo(), ["git", "trees"]);
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octocat/Hello-World/git/trees"
        );
    }

    #[test]
    fn branch_with_slash_stays_hierarchical() {
        let branch = "feature/new images";
        let url = client().endpoint(
            &repo(),
            ["git", "ref", "heads"].into_iter().chain(branch.split('/')),
        );
        assert!(url.as_str().ends_with("/git/ref/heads/feature/new%20images"));
    }

    #[test]
    fn invalid_api_base_rejected() {
        assert!(matches!(
            GitHubClient::new("not a url", Duration::from_secs(1)),
            Err(RemoteError::Transport(_))
        ));
        assert!(GitHubClient::new("mailto:me@example.com", Duration::from_secs(1)).is_err());
    }

    // =========================================================================
    // Request bodies
    // =========================================================================

    #[test]
    fn tree_request_serializes_deletions_as_null() {
        let changes = vec![
            TreeChange::upsert("images/a.webp", "aaa"),
            TreeChange::delete("images/old.png"),
        ];
        let value = serde_json::to_value(TreeRequest::new("base123", &changes)).unwrap();
        assert_eq!(
            value,
            json!({
                "base_tree": "base123",
                "tree": [
                    {"path": "images/a.webp", "mode": "100644", "type": "blob", "sha": "aaa"},
                    {"path": "images/old.png", "mode": "100644", "type": "blob", "sha": null}
                ]
            })
        );
    }

    #[test]
    fn blob_request_is_base64() {
        let body = BlobRequest {
            content: BASE64.encode(b"hello"),
            encoding: "base64",
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"content": "aGVsbG8=", "encoding": "base64"})
        );
    }

    #[test]
    fn commit_and_ref_bodies() {
        let commit = NewCommit {
            message: "Upload",
            tree: "t1",
            parents: ["c0"],
        };
        assert_eq!(
            serde_json::to_value(commit).unwrap(),
            json!({"message": "Upload", "tree": "t1", "parents": ["c0"]})
        );
        let update = RefUpdate {
            sha: "c1",
            force: false,
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({"sha": "c1", "force": false})
        );
    }

    // =========================================================================
    // Error classification
    // =========================================================================

    #[test]
    fn missing_branch_is_not_found() {
        let err = classify(
            Call::ReadRef,
            StatusCode::NOT_FOUND,
            r#"{"message":"Not Found"}"#,
        );
        assert_eq!(err, RemoteError::NotFound("Not Found".into()));
    }

    #[test]
    fn write_failures_pass_message_through() {
        let err = classify(
            Call::CreateBlob,
            StatusCode::FORBIDDEN,
            r#"{"message":"Resource not accessible by personal access token"}"#,
        );
        assert_eq!(
            err,
            RemoteError::Write("Resource not accessible by personal access token".into())
        );
    }

    #[test]
    fn write_failure_without_message_uses_fallback() {
        let err = classify(Call::CreateTree, StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err, RemoteError::Write("Tree creation failed".into()));
    }

    #[test]
    fn non_fast_forward_is_conflict() {
        let err = classify(
            Call::UpdateRef,
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Update is not a fast forward"}"#,
        );
        assert_eq!(err, RemoteError::Conflict("Update is not a fast forward".into()));
    }

    #[test]
    fn ref_update_on_deleted_branch_is_not_found() {
        let err = classify(Call::UpdateRef, StatusCode::NOT_FOUND, "{}");
        assert_eq!(err, RemoteError::NotFound("Updating ref failed".into()));

        let err = classify(
            Call::UpdateRef,
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Reference does not exist"}"#,
        );
        assert_eq!(err, RemoteError::NotFound("Reference does not exist".into()));
    }

    #[test]
    fn other_unprocessable_ref_update_is_write_failure() {
        let err = classify(
            Call::UpdateRef,
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Validation Failed"}"#,
        );
        assert_eq!(err, RemoteError::Write("Validation Failed".into()));
        assert!(matches!(
            classify(Call::UpdateRef, StatusCode::CONFLICT, "{}"),
            RemoteError::Conflict(_)
        ));
    }

    #[test]
    fn other_read_failures_keep_status() {
        let err = classify(
            Call::ReadCommit,
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Bad credentials"}"#,
        );
        assert_eq!(
            err,
            RemoteError::Api {
                status: 401,
                message: "Bad credentials".into()
            }
        );
    }

    // =========================================================================
    // Folder listing
    // =========================================================================

    #[test]
    fn listing_keeps_only_files_in_order() {
        let body = json!([
            {"type": "file", "path": "images/b.webp", "sha": "s2",
             "download_url": "https://raw.example/b.webp"},
            {"type": "dir", "path": "images/thumbs", "sha": "s3", "download_url": null},
            {"type": "file", "path": "images/a.png", "sha": "s1",
             "download_url": "https://raw.example/a.png"}
        ])
        .to_string();
        let entries = parse_folder_listing(&body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "images/b.webp");
        assert_eq!(entries[1].sha, "s1");
        assert_eq!(
            entries[1].download_url.as_deref(),
            Some("https://raw.example/a.png")
        );
    }

    #[test]
    fn listing_of_a_file_is_empty() {
        let body = json!({"type": "file", "path": "README.md", "sha": "x", "download_url": null})
            .to_string();
        assert!(parse_folder_listing(&body).unwrap().is_empty());
    }

    #[test]
    fn listing_garbage_is_transport_error() {
        assert!(matches!(
            parse_folder_listing("not json"),
            Err(RemoteError::Transport(_))
        ));
    }

    // =========================================================================
    // Wire behaviour against a local HTTP server
    // =========================================================================

    struct Received {
        request_line: String,
        /// Header lines, lowercased.
        headers: Vec<String>,
        body: String,
    }

    impl Received {
        fn has_header(&self, line: &str) -> bool {
            self.headers.iter().any(|h| h == line)
        }
    }

    /// Answer one connection per canned `(status, body)`, in order.
    fn serve(responses: Vec<(u16, &'static str)>) -> (GitHubClient, mpsc::Receiver<Received>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let api_base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                tx.send(read_request(&mut stream)).unwrap();
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });
        (local_client(api_base), rx)
    }

    /// Same settings as [`GitHubClient::new`], minus any proxy from the environment.
    fn local_client(api_base: Url) -> GitHubClient {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap();
        GitHubClient { http, api_base }
    }

    fn read_request(stream: &mut TcpStream) -> Received {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end().to_ascii_lowercase();
            if line.is_empty() {
                break;
            }
            headers.push(line);
        }
        let length = headers
            .iter()
            .find_map(|h| h.strip_prefix("content-length: "))
            .map_or(0, |n| n.parse::<usize>().unwrap());
        let mut body = vec![0; length];
        reader.read_exact(&mut body).unwrap();
        Received {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    }

    fn tok() -> Credential {
        Credential::new("tok")
    }

    fn short_repo() -> RepoRef {
        RepoRef::new("o", "r")
    }

    #[test]
    fn listing_sends_api_headers_and_treats_404_as_empty() {
        let (client, rx) = serve(vec![(404, r#"{"message":"Not Found"}"#)]);

        let entries = client
            .list_folder(&tok(), &short_repo(), "main", "my dir/sub/")
            .unwrap();

        assert!(entries.is_empty());
        let req = rx.recv().unwrap();
        assert_eq!(
            req.request_line,
            "GET /repos/o/r/contents/my%20dir/sub?ref=main HTTP/1.1"
        );
        assert!(req.has_header("authorization: bearer tok"));
        assert!(req.has_header("accept: application/vnd.github+json"));
        assert!(req.has_header("x-github-api-version: 2022-11-28"));
        assert!(req.headers.iter().any(|h| h.starts_with("user-agent: imgcommit/")));
    }

    #[test]
    fn listing_other_failures_are_errors() {
        let (client, _rx) = serve(vec![(401, r#"{"message":"Bad credentials"}"#)]);
        let err = client
            .list_folder(&tok(), &short_repo(), "main", "img")
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::Api {
                status: 401,
                message: "Bad credentials".into()
            }
        );
    }

    #[test]
    fn branch_head_reads_ref_then_commit() {
        let (client, rx) = serve(vec![
            (200, r#"{"ref":"refs/heads/main","object":{"sha":"c0","type":"commit"}}"#),
            (200, r#"{"sha":"c0","tree":{"sha":"t0"}}"#),
        ]);

        let head = client.branch_head(&tok(), &short_repo(), "main").unwrap();

        assert_eq!(head.commit_sha, "c0");
        assert_eq!(head.tree_sha, "t0");
        assert_eq!(
            rx.recv().unwrap().request_line,
            "GET /repos/o/r/git/ref/heads/main HTTP/1.1"
        );
        assert_eq!(
            rx.recv().unwrap().request_line,
            "GET /repos/o/r/git/commits/c0 HTTP/1.1"
        );
    }

    #[test]
    fn create_blob_posts_base64_json() {
        let (client, rx) = serve(vec![(201, r#"{"sha":"b10b","url":"x"}"#)]);

        let sha = client.create_blob(&tok(), &short_repo(), b"hello").unwrap();

        assert_eq!(sha, "b10b");
        let req = rx.recv().unwrap();
        assert_eq!(req.request_line, "POST /repos/o/r/git/blobs HTTP/1.1");
        assert!(req.has_header("content-type: application/json"));
        assert!(req.has_header("authorization: bearer tok"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&req.body).unwrap(),
            json!({"content": "aGVsbG8=", "encoding": "base64"})
        );
    }

    #[test]
    fn update_ref_patches_without_force() {
        let (client, rx) = serve(vec![(200, r#"{"ref":"refs/heads/main"}"#)]);

        client
            .update_ref(&tok(), &short_repo(), "main", "c1")
            .unwrap();

        let req = rx.recv().unwrap();
        assert_eq!(req.request_line, "PATCH /repos/o/r/git/refs/heads/main HTTP/1.1");
        assert!(req.has_header("content-type: application/json"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&req.body).unwrap(),
            json!({"sha": "c1", "force": false})
        );
    }

    #[test]
    fn update_ref_rejections_over_the_wire() {
        let (client, _rx) = serve(vec![
            (422, r#"{"message":"Update is not a fast forward"}"#),
            (422, r#"{"message":"Reference does not exist"}"#),
        ]);

        let race = client
            .update_ref(&tok(), &short_repo(), "main", "c1")
            .unwrap_err();
        let gone = client
            .update_ref(&tok(), &short_repo(), "main", "c1")
            .unwrap_err();

        assert!(matches!(race, RemoteError::Conflict(_)));
        assert_eq!(gone, RemoteError::NotFound("Reference does not exist".into()));
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = local_client(Url::parse(&format!("http://{addr}/")).unwrap());

        let err = client
            .create_blob(&tok(), &short_repo(), b"x")
            .unwrap_err();

        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
