//! Typed commands parsed from slash-command interactions.

use std::collections::HashMap;

use serde_json::Value;

use crate::discord::InteractionData;
use crate::error::CommandError;
use crate::system::{MemberDraft, MemberUpdate, SystemDraft};

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateSystem(SystemDraft),
    AddMember(MemberDraft),
    UpdateMember { id: String, update: MemberUpdate },
    Members,
    DeleteMember { id: String },
    Switch { id: String },
}

impl Command {
    /// Parse interaction data into a command.
    ///
    /// Blank option values are treated as absent. Values are trimmed except
    /// for proxy tags, which match literally. In `updatemember`, an optional
    /// field given as `-clear` is unset.
    pub fn parse(data: &InteractionData) -> Result<Self, CommandError> {
        let opts = Options::new(data);
        match data.name.as_str() {
            "createsystem" => Ok(Self::CreateSystem(SystemDraft {
                name: opts.required("name")?,
                description: opts.get("description"),
                tag: opts.get("tag"),
                avatar: opts.get("avatar"),
            })),
            "addmember" => Ok(Self::AddMember(MemberDraft {
                name: opts.required("name")?,
                display_name: opts.get("displayname"),
                pronouns: opts.get("pronouns"),
                avatar: opts.get("avatar"),
                color: opts.get("color"),
                description: opts.get("description"),
                birthdate: opts.get("birthdate"),
                prefix: opts.tag("prefix"),
                suffix: opts.tag("suffix"),
            })),
            "updatemember" => Ok(Self::UpdateMember {
                id: opts.required("id")?,
                update: MemberUpdate {
                    name: opts.get("name"),
                    display_name: opts.clearable("displayname"),
                    pronouns: opts.clearable("pronouns"),
                    avatar: opts.clearable("avatar"),
                    color: opts.clearable("color"),
                    description: opts.clearable("description"),
                    birthdate: opts.clearable("birthdate"),
                    prefix: opts.clearable_tag("prefix"),
                    suffix: opts.clearable_tag("suffix"),
                },
            }),
            "members" => Ok(Self::Members),
            "deletemember" => Ok(Self::DeleteMember {
                id: opts.required("id")?,
            }),
            "switch" => Ok(Self::Switch {
                id: opts.required("id")?,
            }),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The slash-command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSystem(_) => "createsystem",
            Self::AddMember(_) => "addmember",
            Self::UpdateMember { .. } => "updatemember",
            Self::Members => "members",
            Self::DeleteMember { .. } => "deletemember",
            Self::Switch { .. } => "switch",
        }
    }
}

/// Option value that unsets a field in `updatemember`.
pub const CLEAR_KEYWORD: &str = "-clear";

struct Options<'a> {
    command: &'a str,
    values: HashMap<&'a str, String>,
}

impl<'a> Options<'a> {
    fn new(data: &'a InteractionData) -> Self {
        let values = data
            .options
            .iter()
            .filter_map(|o| {
                let text = match o.value.as_ref()? {
                    Value::String(s) => s.clone(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                (!text.trim().is_empty()).then_some((o.name.as_str(), text))
            })
            .collect();
        Self {
            command: &data.name,
            values,
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| v.trim().to_string())
    }

    /// Untrimmed value.
    fn tag(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    /// An empty string stands for "unset".
    fn clearable(&self, name: &str) -> Option<String> {
        self.get(name).map(clear_to_empty)
    }

    fn clearable_tag(&self, name: &str) -> Option<String> {
        self.tag(name).map(clear_to_empty)
    }

    fn required(&self, name: &str) -> Result<String, CommandError> {
        self.get(name).ok_or_else(|| CommandError::MissingOption {
            command: self.command.to_string(),
            option: name.to_string(),
        })
    }
}

fn clear_to_empty(value: String) -> String {
    if value.trim().eq_ignore_ascii_case(CLEAR_KEYWORD) {
        String::new()
    } else {
        value
    }
}
