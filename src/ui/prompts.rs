//! Confirmation prompt

use super::context::UiContext;
use crate::error::{CwbuildError, CwbuildResult};

/// Ask a yes/no question.
///
/// `--yes` answers yes; without a terminal the question isn't asked and
/// `default` is the answer.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> CwbuildResult<bool> {
    if ctx.auto_yes() {
        eprintln!("  {} (--yes)", message);
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| CwbuildError::User(format!("prompt task failed: {}", e)))?
    .map_err(|e| CwbuildError::User(format!("prompt failed: {}", e)))
}
