//! Relay Daemon - Session registry and broadcast server
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `config` - Layered configuration (defaults, TOML, environment)
//! - `registry` - Registry actor owning active sessions and message history
//! - `session` - Per-client login state machine
//! - `server` - TCP listener and per-connection handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relayd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   RelayServer   │     │       RegistryActor         │    │
//! │  │  (TcpListener)  │     │ (sessions + history owner)  │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │ connections                 │ commands          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │ConnectionHandler│────▶│          Session            │    │
//! │  │  (per client)   │     │   (login state machine)     │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod server;
pub mod session;
