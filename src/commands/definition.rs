//! Slash-command descriptors and the registration payload built from them.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::error::CommandError;

/// Discord application command type for chat-input (slash) commands.
const CHAT_INPUT: u8 = 1;

/// Discord option type for string values.
const OPTION_STRING: u8 = 3;

const MAX_DESCRIPTION: usize = 100;

static COMMAND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,32}$").expect("valid command name regex"));

/// One string option of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl OptionSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
        }
    }
}

/// A slash command as registered with Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<OptionSpec>,
}

impl CommandSpec {
    /// Check the descriptor against Discord's registration rules.
    pub fn validate(&self) -> Result<(), CommandError> {
        let invalid = |reason: String| CommandError::InvalidDefinition {
            command: self.name.to_string(),
            reason,
        };

        check_name(self.name).map_err(&invalid)?;
        check_description(self.description).map_err(&invalid)?;

        let mut seen = HashSet::new();
        let mut optional_seen = false;
        for option in &self.options {
            check_name(option.name).map_err(|r| invalid(format!("option {}: {r}", option.name)))?;
            check_description(option.description)
                .map_err(|r| invalid(format!("option {}: {r}", option.name)))?;
            if !seen.insert(option.name) {
                return Err(invalid(format!("duplicate option {}", option.name)));
            }
            if option.required && optional_seen {
                return Err(invalid(format!(
                    "required option {} follows an optional one",
                    option.name
                )));
            }
            optional_seen |= !option.required;
        }
        Ok(())
    }

    fn to_json(&self) -> Value {
        let options: Vec<Value> = self
            .options
            .iter()
            .map(|o| {
                json!({
                    "type": OPTION_STRING,
                    "name": o.name,
                    "description": o.description,
                    "required": o.required,
                })
            })
            .collect();
        json!({
            "type": CHAT_INPUT,
            "name": self.name,
            "description": self.description,
            "options": options,
        })
    }
}

fn check_name(name: &str) -> Result<(), String> {
    if COMMAND_NAME.is_match(name) {
        Ok(())
    } else {
        Err(format!("name {name:?} must match [a-z0-9_-]{{1,32}}"))
    }
}

fn check_description(description: &str) -> Result<(), String> {
    let len = description.chars().count();
    if (1..=MAX_DESCRIPTION).contains(&len) {
        Ok(())
    } else {
        Err(format!("description must be 1-{MAX_DESCRIPTION} characters, got {len}"))
    }
}

/// Member fields shared by `addmember` and `updatemember`, all optional.
const MEMBER_FIELDS: [OptionSpec; 8] = [
    OptionSpec::optional("displayname", "The display name shown on proxied messages"),
    OptionSpec::optional("pronouns", "The member's pronouns"),
    OptionSpec::optional("avatar", "URL of the member's avatar"),
    OptionSpec::optional("color", "Hex color for the member, like #ff8800"),
    OptionSpec::optional("description", "A short description of the member"),
    OptionSpec::optional("birthdate", "The member's birthdate"),
    OptionSpec::optional("prefix", "Text that starts a message to proxy as this member"),
    OptionSpec::optional("suffix", "Text that ends a message to proxy as this member"),
];

/// Every command the bot understands.
pub fn command_specs() -> Vec<CommandSpec> {
    let mut add_options = vec![OptionSpec::required("name", "The member's name")];
    add_options.extend(MEMBER_FIELDS);

    let mut update_options = vec![
        OptionSpec::required("id", "ID of the member to update"),
        OptionSpec::optional("name", "The member's new name"),
    ];
    update_options.extend(MEMBER_FIELDS);

    vec![
        CommandSpec {
            name: "createsystem",
            description: "Create your plural system",
            options: vec![
                OptionSpec::required("name", "The name of your system"),
                OptionSpec::optional("description", "A description of your system"),
                OptionSpec::optional("tag", "A tag for your system"),
                OptionSpec::optional("avatar", "URL of the system avatar"),
            ],
        },
        CommandSpec {
            name: "addmember",
            description: "Add a member to your system",
            options: add_options,
        },
        CommandSpec {
            name: "updatemember",
            description: "Update a member of your system; give -clear to unset a field",
            options: update_options,
        },
        CommandSpec {
            name: "members",
            description: "List the members of your system",
            options: Vec::new(),
        },
        CommandSpec {
            name: "deletemember",
            description: "Delete a member from your system",
            options: vec![OptionSpec::required("id", "ID of the member to delete")],
        },
        CommandSpec {
            name: "switch",
            description: "Record which member is fronting",
            options: vec![OptionSpec::required("id", "ID of the fronting member")],
        },
    ]
}

/// Validate every command and render the bulk-overwrite payload.
pub fn command_definitions() -> Result<Value, CommandError> {
    let specs = command_specs();
    let mut names = HashSet::new();
    for spec in &specs {
        spec.validate()?;
        if !names.insert(spec.name) {
            return Err(CommandError::InvalidDefinition {
                command: spec.name.to_string(),
                reason: "registered twice".into(),
            });
        }
    }
    Ok(Value::Array(specs.iter().map(CommandSpec::to_json).collect()))
}
