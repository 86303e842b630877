//! Plural Proxy: a Discord bot that reposts a plural system's messages
//! under the identity of the member who wrote them.

pub mod bot;
pub mod commands;
pub mod config;
pub mod discord;
pub mod error;
pub mod proxy;
pub mod state;
pub mod store;
pub mod system;
