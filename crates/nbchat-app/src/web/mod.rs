// WebSocket frontend for the View Bridge
pub mod routes;
pub mod server;

pub use server::{WebServer, WebServerConfig};
