//! Proxying: tag matching, per-channel masks, and the repost flow.

pub mod masks;
pub mod matcher;
pub mod orchestrator;

pub use masks::MaskCache;
pub use matcher::{ProxyMatch, match_tags};
pub use orchestrator::{IgnoreReason, ProxyOrchestrator, ProxyOutcome};
