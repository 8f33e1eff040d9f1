//! `wtree-guard run`: hold a lock for the duration of a child command.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::exit_codes;
use crate::locks::LockManager;
use crate::rollback::{GitResource, RollbackManager};
use crate::transaction::run_guarded;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(super) fn cmd_run(args: RunArgs, config: &Config) -> Result<i32> {
    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| GuardError::UserError("no command given to run".to_string()))?;

    let manager = LockManager::from_config(config)?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.lock_timeout());
    let mut rollback =
        RollbackManager::new(Arc::new(GitResource::new("."))).with_policy(config.fail_fast_policy());

    run_guarded(
        &manager,
        &mut rollback,
        args.kind,
        &args.target,
        timeout,
        |rb| {
            for path in &args.cleanup {
                rb.add_file_cleanup(path);
            }

            let command_line = args.command.join(" ");
            info!(command = %command_line, "running command under lock");
            let status = Command::new(program)
                .args(program_args)
                .status()
                .map_err(|e| GuardError::UserError(format!("failed to run '{}': {}", program, e)))?;

            if status.success() {
                Ok(exit_codes::SUCCESS)
            } else {
                Err(GuardError::CommandFailed {
                    command: command_line,
                    code: exit_status_code(status),
                })
            }
        },
    )
}

/// Exit code to report for a finished child; signals map to `128 + signal`.
fn exit_status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    exit_codes::USER_ERROR
}
