//! Client data-access layer for the taskchat API.
//!
//! Typed calls against the remote task/chat backend, an observable auth
//! context that supplies bearer tokens, and view-state containers that hold
//! the last loaded snapshot of tasks and chat sessions.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod confirm;
pub mod state;
