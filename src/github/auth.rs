//! Credential acquisition via the `gh` CLI
//!
//! The token is obtained once per process, before any network call.
//! Failure here is fatal: nothing else works without a credential.

use crate::{Error, Result};
use tokio::process::Command;

/// Obtain a GitHub bearer token by running `gh auth token`
pub async fn obtain_token() -> Result<String> {
    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .map_err(|e| Error::Auth(format!("failed to run gh: {e}")))?;

    if !output.status.success() {
        return Err(Error::Auth(
            "gh CLI not authenticated. Run: gh auth login".to_string(),
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::Auth("gh auth token returned empty output".to_string()));
    }
    Ok(token)
}
