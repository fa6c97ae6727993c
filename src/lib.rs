//! # Meshbot - Command Bots for Meshtastic Networks
//!
//! Meshbot runs text-command bots on a Meshtastic mesh and bridges them to Mastodon:
//! radio users can log in to an instance, post statuses and receive their
//! notifications over LoRa.
//!
//! ## Features
//!
//! - **Command Framework**: prefix commands (`!help`, `!ping`) with per-command help
//!   text, examples and failure isolation.
//! - **Multi-step Flows**: a bot can wait for the next message and hand it to a
//!   continuation, which is how the OAuth code is collected during `!login`.
//! - **Frame-safe Output**: long replies are split on UTF-8 boundaries into frames that
//!   fit the radio payload and are never interleaved with other messages.
//! - **Mastodon Bridge**: posting, out-of-band OAuth login and live notifications
//!   relayed to a configurable channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshbot::config::Config;
//! use meshbot::server::BridgeServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     BridgeServer::new(config).run(None).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - command registry, bot state machine, chunked sink, event bridge
//! - [`meshtastic`] - radio transport trait, serial link and stream framing
//! - [`social`] - social adapter trait, Mastodon client and notification relay
//! - [`server`] - application wiring used by the binary
//! - [`config`] - configuration loading and defaults
//! - [`validation`] - input validation for instances, prefixes and posts
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   RadioEvent    ┌──────────────┐
//! │ Serial reader│ ──────────────► │ EventBridge  │ (bot-dispatch thread)
//! └──────────────┘                 └──────┬───────┘
//!                                         │ on_receive / on_connection
//!                                  ┌──────▼───────┐      ┌──────────────┐
//!                                  │     Bot      │ ───► │ SocialAdapter│
//!                                  └──────┬───────┘      └──────┬───────┘
//!                                         │ send_text           │ notifications
//!                                  ┌──────▼───────────┐  ┌──────▼───────┐
//!                                  │ChunkedMessageSink│◄─│ Relay thread │
//!                                  └──────┬───────────┘  └──────────────┘
//!                                         │ frames
//!                                  ┌──────▼───────┐
//!                                  │ MeshTransport│
//!                                  └──────────────┘
//! ```

pub mod bot;
pub mod config;
pub mod errors;
pub mod logutil;
pub mod meshtastic;
pub mod metrics;
pub mod server;
pub mod social;
pub mod validation;
