//! Command handler: runs a parsed command against the app state and builds
//! the ephemeral reply.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::commands::Command;
use crate::discord::{Embed, InteractionReply};
use crate::error::{Error, SystemError};
use crate::state::AppState;
use crate::system::model::color_value;
use crate::system::{Member, System};

pub const NOT_AUTHORIZED: &str = "You are not authorized to use this bot.";
pub const NO_SYSTEM: &str = "You need to create a system first with `/createsystem`.";
pub const SYSTEM_EXISTS: &str = "You already have a system.";
pub const NO_MEMBERS: &str = "Your system has no members yet. Add some with `/addmember`.";
pub const SAVE_FAILED: &str = "Your change could not be saved, so nothing was changed.";
pub const GENERIC_ERROR: &str = "There was an error executing this command!";

pub struct CommandHandler {
    state: Arc<AppState>,
}

impl CommandHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Run `command` on behalf of `invoker_id`.
    pub async fn handle(&self, invoker_id: &str, command: Command) -> InteractionReply {
        if !self.state.is_owner(invoker_id) {
            warn!(invoker_id, command = command.name(), "Rejected command from non-owner");
            return failure_reply(
                command.name(),
                SystemError::Unauthorized(invoker_id.to_string()).into(),
            );
        }

        let name = command.name();
        let result = match command {
            Command::CreateSystem(draft) => self.state.create_system(draft).await.map(|system| {
                InteractionReply::text(format!("System \"{}\" created successfully!", system.name))
            }),
            Command::AddMember(draft) => self.state.add_member(draft).await.map(|m| {
                InteractionReply::embed(member_embed(
                    &m,
                    "Member Added",
                    "Member has been added to your system.",
                ))
            }),
            Command::UpdateMember { id, update } => {
                self.state.update_member(&id, update).await.map(|m| {
                    InteractionReply::embed(member_embed(&m, "Member Updated", "Member has been updated."))
                })
            }
            Command::Members => self.members().await,
            Command::DeleteMember { id } => self.state.delete_member(&id).await.map(|m| {
                InteractionReply::text(format!("Member \"{}\" deleted successfully.", m.name))
            }),
            Command::Switch { id } => match self.state.get_member(&id).await {
                Ok(m) => {
                    info!(member = %m.name, "Switch recorded");
                    Ok(InteractionReply::text(format!(
                        "Recorded switch: {} is now fronting.",
                        m.name
                    )))
                }
                Err(e) => Err(e.into()),
            },
        };

        result.unwrap_or_else(|e| failure_reply(name, e))
    }

    async fn members(&self) -> Result<InteractionReply, Error> {
        let system = self.state.system().await.ok_or(SystemError::NoSystemExists)?;
        if system.member_count() == 0 {
            return Ok(InteractionReply::text(NO_MEMBERS));
        }
        Ok(InteractionReply::embed(members_embed(&system)))
    }
}

fn failure_reply(command: &str, err: Error) -> InteractionReply {
    let text = match &err {
        Error::System(SystemError::NoSystemExists) => NO_SYSTEM.to_string(),
        Error::System(SystemError::SystemAlreadyExists) => SYSTEM_EXISTS.to_string(),
        Error::System(SystemError::Unauthorized(_)) => NOT_AUTHORIZED.to_string(),
        Error::System(e @ (SystemError::MemberNotFound(_) | SystemError::InvalidColor(_))) => {
            e.to_string()
        }
        Error::Store(e) => {
            error!(command, error = %e, "Command could not be persisted");
            SAVE_FAILED.to_string()
        }
        other => {
            error!(command, error = %other, "Command failed");
            GENERIC_ERROR.to_string()
        }
    };
    InteractionReply::text(text)
}

fn member_embed(member: &Member, title: &str, description: &str) -> Embed {
    let mut embed = Embed::new()
        .title(format!("{title}: {}", member.name))
        .description(description)
        .field("ID", &member.id)
        .field("Name", &member.name);

    let optional = [
        ("Display Name", member.display_name.clone()),
        ("Pronouns", member.pronouns.clone()),
        ("Description", member.description.clone()),
        ("Birthdate", member.birthdate.clone()),
        ("Prefix", member.proxy_prefix().map(|p| format!("`{p}`"))),
        ("Suffix", member.proxy_suffix().map(|s| format!("`{s}`"))),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            embed = embed.field(name, value);
        }
    }

    if let Some(color) = member.color.as_deref().and_then(color_value) {
        embed = embed.color(color);
    }
    if let Some(avatar) = &member.avatar {
        embed = embed.thumbnail(avatar);
    }
    embed
}

fn members_embed(system: &System) -> Embed {
    let mut embed = Embed::new()
        .title(format!("{}'s Members", system.name))
        .description(format!("Total members: {}", system.member_count()));
    if let Some(avatar) = &system.avatar {
        embed = embed.thumbnail(avatar);
    }

    for member in system.members() {
        let mut lines = Vec::new();
        if let Some(display) = &member.display_name {
            lines.push(format!("Display Name: {display}"));
        }
        if let Some(pronouns) = &member.pronouns {
            lines.push(format!("Pronouns: {pronouns}"));
        }
        let tags: Vec<String> = [
            member.proxy_prefix().map(|p| format!("Prefix: `{p}`")),
            member.proxy_suffix().map(|s| format!("Suffix: `{s}`")),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !tags.is_empty() {
            lines.push(tags.join(" | "));
        }
        lines.push(format!("ID: {}", member.id));
        embed = embed.field(&member.name, lines.join("\n"));
    }
    embed
}
