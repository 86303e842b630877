//! Plural system model: the owner's system and its member registry.

pub mod model;

pub use model::{Member, MemberDraft, MemberUpdate, System, SystemDraft};
