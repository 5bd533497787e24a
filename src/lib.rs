//! Perk modifier evaluation for a chat-hosted trading game.
//!
//! Catalog rules are compiled once at load ([catalog]), evaluated per user
//! against a snapshot of holdings and state ([perks]), and surfaced through
//! caller helpers ([services]), an HTTP API ([server]) and a CLI ([cli]).

pub mod catalog;
pub mod cli;
pub mod config;
pub mod perks;
pub mod server;
pub mod services;
pub mod store;
