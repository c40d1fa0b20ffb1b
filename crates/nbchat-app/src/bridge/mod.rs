//! View Bridge: the message contract between a UI and the chat controller.

pub mod controller;
pub mod protocol;

pub use controller::{BridgeClosed, BridgeHandle, Controller, ControllerBuilder};
pub use protocol::{ClientMessage, QueryId, ServerMessage};
