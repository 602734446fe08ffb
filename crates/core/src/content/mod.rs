//! Content rewriting between display and canonical storage forms.
//!
//! Post bodies are stored with stable asset-ID markers
//! (`<img data-image-id="...">`) and rendered with resolvable serving URLs
//! (`<img src="/images/v2/...">`). The matching rules live in one place,
//! [`MarkerPolicy`], so the attribute name and URL shape are a single
//! swappable policy rather than scattered pattern literals.

mod policy;
mod rewriter;

pub use policy::{MarkerPolicy, ReferenceDiff};
pub use rewriter::ContentRewriter;
