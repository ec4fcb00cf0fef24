// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

#[path = "commands.rs"]
pub mod commands;

// Re-export commonly used handler functions for convenience
pub use handlers::{config_from_args, expand_path, log_level};

pub use linkwho_core::{RunConfig, RunSummary, execute_run};
