//! HTTP calling infrastructure

mod cache;
mod caller;
mod pagination;
mod template;

pub use cache::{fingerprint, CachedResponse, FingerprintParts, ResponseCache, ResponseCacheConfig};
pub use caller::{CallOutcome, HttpCaller, HttpCallerConfig};
pub use template::{has_placeholders, render_template};
