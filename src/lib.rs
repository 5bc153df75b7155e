//! Avatar Assist — streaming-avatar session engine.
//!
//! Wires the avatar service's open API into a chat session: credential
//! exchange, knowledge-base resolution (with durable caching), and a
//! streaming-session state machine driven by transport events.

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod roster;
pub mod session;
