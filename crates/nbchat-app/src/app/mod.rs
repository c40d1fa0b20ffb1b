pub mod repl;
pub mod setup;

pub use repl::{ask_once, run_repl_mode};
pub use setup::{setup_from_cli, AppContext};
