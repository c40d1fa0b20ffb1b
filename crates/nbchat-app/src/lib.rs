//! nbchat application library
//!
//! The View Bridge controller and the frontends that drive it: a terminal
//! REPL and a WebSocket server.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod web;

pub use app::{ask_once, run_repl_mode, setup_from_cli, AppContext};
pub use bridge::{BridgeHandle, ClientMessage, Controller, ServerMessage};
pub use cli::{Cli, Commands, KeyCommands};
