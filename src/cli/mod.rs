pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, FixUpdateArgs};
pub use handlers::handle_fix_update;
