//! Self-update by content digest
//!
//! The installed artifact is compared byte-for-byte (via SHA-256) against a
//! remote reference copy. No version numbers are involved.

mod checker;
mod digest;
mod fetch;

pub use checker::{
    AppliedUpdate, StagedUpdate, UpdateCheck, UpdateChecker, UpdateError, UpdateStatus,
};
pub use digest::{ArtifactDigest, SHORT_DIGEST_LEN};
pub use fetch::{DefaultFetcher, FetchError, Fetcher, FileFetcher, HttpFetcher, Scheme};
