//! System and member data model: the registry the proxy matcher runs over.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SystemError;

/// Alphabet for generated ids (base-36, lowercase).
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated system and member ids.
const ID_LENGTH: usize = 12;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([0-9a-fA-F]{6})$").expect("valid color regex"));

/// Generate a short random id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Validate a hex color and normalize it to `#rrggbb`.
pub fn normalize_color(raw: &str) -> Result<String, SystemError> {
    let caps = HEX_COLOR
        .captures(raw.trim())
        .ok_or_else(|| SystemError::InvalidColor(raw.to_string()))?;
    Ok(format!("#{}", caps[1].to_ascii_lowercase()))
}

/// Parse a `#rrggbb` color into the integer form Discord embeds use.
pub fn color_value(color: &str) -> Option<u32> {
    let caps = HEX_COLOR.captures(color.trim())?;
    u32::from_str_radix(&caps[1], 16).ok()
}

/// One identity within the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
    /// Avatar URL shown on proxied messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Normalized `#rrggbb`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    /// Literal text a message must start with to proxy as this member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Literal text a message must end with to proxy as this member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub created: DateTime<Utc>,
}

impl Member {
    /// Build a member from a draft, assigning a fresh id and timestamp.
    pub fn from_draft(draft: MemberDraft) -> Result<Self, SystemError> {
        let color = draft.color.as_deref().map(normalize_color).transpose()?;
        Ok(Self {
            id: generate_id(),
            name: draft.name,
            display_name: draft.display_name,
            pronouns: draft.pronouns,
            avatar: draft.avatar,
            color,
            description: draft.description,
            birthdate: draft.birthdate,
            prefix: draft.prefix,
            suffix: draft.suffix,
            created: Utc::now(),
        })
    }

    /// The name shown on proxied messages.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Prefix, treating an empty string as unset.
    pub fn proxy_prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Suffix, treating an empty string as unset.
    pub fn proxy_suffix(&self) -> Option<&str> {
        self.suffix.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the member can ever be auto-matched.
    pub fn has_tags(&self) -> bool {
        self.proxy_prefix().is_some() || self.proxy_suffix().is_some()
    }

    /// Apply a partial update. Fails without touching `self` on an invalid color.
    pub fn apply(&mut self, update: MemberUpdate) -> Result<(), SystemError> {
        let color = match update.color.as_deref() {
            Some("") => Some(None),
            Some(raw) => Some(Some(normalize_color(raw)?)),
            None => None,
        };

        if let Some(name) = update.name.filter(|n| !n.is_empty()) {
            self.name = name;
        }
        patch(&mut self.display_name, update.display_name);
        patch(&mut self.pronouns, update.pronouns);
        patch(&mut self.avatar, update.avatar);
        if let Some(v) = color {
            self.color = v;
        }
        patch(&mut self.description, update.description);
        patch(&mut self.birthdate, update.birthdate);
        patch(&mut self.prefix, update.prefix);
        patch(&mut self.suffix, update.suffix);
        Ok(())
    }
}

fn patch(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = (!v.is_empty()).then_some(v);
    }
}

/// Fields supplied when adding a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDraft {
    pub name: String,
    pub display_name: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub birthdate: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl MemberDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Partial member update. `None` leaves a field unchanged and an empty
/// string unsets it. The name can be changed but never unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub birthdate: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl MemberUpdate {
    /// True when the update would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fields supplied when creating the system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemDraft {
    pub name: String,
    pub description: Option<String>,
    pub tag: Option<String>,
    pub avatar: Option<String>,
}

/// The owner's plural system and its member registry.
///
/// Members are kept in insertion order; that order is the matcher's
/// priority order and is preserved on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-text system tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default)]
    members: Vec<Member>,
}

impl System {
    /// Create an empty system owned by `owner_id`.
    pub fn new(draft: SystemDraft, owner_id: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: draft.name,
            description: draft.description,
            tag: draft.tag,
            avatar: draft.avatar,
            created: Utc::now(),
            owner_id: owner_id.into(),
            members: Vec::new(),
        }
    }

    /// Members in registry order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn get_member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Append a member, re-rolling its id on the off chance it collides.
    pub fn add_member(&mut self, mut member: Member) -> &Member {
        while self.get_member(&member.id).is_some() {
            member.id = generate_id();
        }
        self.members.push(member);
        &self.members[self.members.len() - 1]
    }

    /// Apply a partial update in place and return the updated member.
    pub fn update_member(
        &mut self,
        id: &str,
        update: MemberUpdate,
    ) -> Result<&Member, SystemError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| SystemError::MemberNotFound(id.to_string()))?;
        member.apply(update)?;
        Ok(member)
    }

    /// Remove a member, returning it.
    pub fn remove_member(&mut self, id: &str) -> Result<Member, SystemError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| SystemError::MemberNotFound(id.to_string()))?;
        Ok(self.members.remove(idx))
    }

    /// Re-check invariants after deserialization: drops members whose id
    /// duplicates an earlier one. Returns how many were dropped.
    pub fn dedup_members(&mut self) -> usize {
        let before = self.members.len();
        let mut seen = std::collections::HashSet::new();
        self.members.retain(|m| seen.insert(m.id.clone()));
        before - self.members.len()
    }
}
