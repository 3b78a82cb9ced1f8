#![forbid(unsafe_code)]

//! # updraft-core
//!
//! Data model shared by every updraft crate.
//!
//! - [`Update`]: one versioned bundle, ordered by [`Recency`] (`commit_time`, then `id`).
//! - [`Asset`]: one file of an update, mapped to `<updates_dir>/<filename>`.
//! - [`ManifestFilters`] and [`matches`]: the manifest filter predicate.
//! - [`ContentHash`]: base64url SHA-256 used to verify downloads.

mod asset;
mod errors;
mod filters;
mod hash;
mod update;

pub use asset::Asset;
pub use errors::{CoreError, CoreResult};
pub use filters::{ManifestFilters, matches};
pub use hash::{ContentHash, ContentHasher};
pub use update::{Metadata, Recency, Update, UpdateId, UpdateStatus};
