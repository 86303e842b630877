//! Discord platform layer: REST client, gateway session, and API types.

pub mod gateway;
pub mod platform;
pub mod rest;
pub mod types;

pub use gateway::{EventStream, Gateway, GatewayEvent};
pub use platform::Platform;
pub use rest::DiscordRest;
pub use types::*;

#[cfg(test)]
pub(crate) mod fake;
