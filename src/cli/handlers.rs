use super::commands::FixUpdateArgs;
use crate::language::LanguageRegistry;
use crate::update::{run_fix_update, FixUpdateCommand};
use std::io::{self, Write};
use tracing::debug;

/// Runs `update` or `fix` against stdout and returns the process exit code.
pub fn handle_fix_update(cmd: FixUpdateCommand, args: &FixUpdateArgs) -> i32 {
    debug!(command = %cmd, ?args, "Running command");

    let registry = LanguageRegistry::with_defaults();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = run_fix_update(cmd, args, &registry, &mut out);
    let _ = out.flush();

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("buildsmith {}: {}", cmd, e);
            1
        }
    }
}
