// ABOUTME: Main library entry point for the unfurl link-metadata service.
// ABOUTME: Re-exports the public API: Unfurler, UnfurlerBuilder, RuleSet, ExtractionResult and errors.

//! Unfurl - rule-driven link metadata extraction.
//!
//! Fetches a web page and extracts title, description, images, canonical
//! link, JSON-LD and more through ordered fallback strategies declared in a
//! [`RuleSet`]. Results also carry the link's coarse type and, for
//! repository pages, the author-uploaded preview image.
//!
//! # Example
//!
//! ```no_run
//! use digests_unfurl::{UnfurlError, Unfurler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), UnfurlError> {
//!     let unfurler = Unfurler::builder().build();
//!     let result = unfurler.unfurl("example.com", false).await?;
//!     println!("{}", serde_json::to_string_pretty(&result).unwrap());
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod clean;
pub mod client;
pub mod document;
pub mod error;
pub mod extract;
pub mod options;
pub mod repo_image;
pub mod resource;
pub mod result;
pub mod rules;
pub mod server;

pub use crate::classify::{classify, classify_response, LinkType};
pub use crate::clean::clean_url;
pub use crate::client::{normalize_input, Unfurler};
pub use crate::error::{ErrorCode, FieldError, RuleSetError, UnfurlError};
pub use crate::options::{Options, UnfurlerBuilder};
pub use crate::repo_image::{is_repository_url, RepoHosts, RepoImageResolver, RepoRef};
pub use crate::result::{ExtractionResult, FieldValue};
pub use crate::rules::loader::{load_builtin_rules, load_rules_from_path, parse_rules};
pub use crate::rules::{Computed, FieldRule, RuleSet, Strategy, ValueKind};
