//! # imgcommit
//!
//! Resize a batch of images and publish them, together with any deletions, to
//! a branch of a hosted Git repository as a single commit. No local clone is
//! needed: everything goes through the host's content-addressable object API.
//!
//! # Architecture: One Batch, One Commit
//!
//! ```text
//! images ──► imaging (resolve geometry → paint → encode)
//!                │
//!                ▼
//!          commit (orchestrator) ──► remote (head → blobs → tree → commit → ref)
//!                │
//!                ▼
//!          output (progress log)
//! ```
//!
//! The branch head is read once at the start of a batch. Blobs, one tree and
//! one commit are built on top of it, and only the final fast-forward ref
//! update makes anything visible. A failure at any step leaves the branch
//! exactly where it was.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry resolution per resize mode, painting, encoding to webp/jpg/png |
//! | [`remote`] | The repository API as a trait, with GitHub and in-memory implementations |
//! | [`commit`] | Batch state machine: validate, upload in parallel, commit atomically |
//! | [`naming`] | Output file names and repository paths |
//! | [`config`] | Layered `imgcommit.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting for progress, listings and plans |
//!
//! # Design Decisions
//!
//! ## Geometry Is Pure
//!
//! Every resize mode reduces to a [`imaging::Geometry`]: canvas size, a source
//! rectangle, a destination rectangle and an optional fill. Resolution is a pure
//! function on the integer pixel grid, so the same inputs always produce the
//! same output bytes and the math can be tested without decoding anything.
//!
//! ## The Remote Is a Trait
//!
//! The orchestrator only sees [`remote::RemoteRepository`]. The GitHub client
//! is one implementation; [`remote::memory::InMemoryRemote`] is another, with
//! recorded calls and injectable failures, so the whole commit sequence is
//! tested without a network.
//!
//! ## No Automatic Retries
//!
//! A batch either lands completely or not at all. When the branch moves during
//! a batch the ref update is rejected as a conflict; the caller re-runs the
//! batch, which re-reads the head rather than reusing stale state.

pub mod commit;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod remote;
