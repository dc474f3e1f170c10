//! SPNEGO/Kerberos negotiation.
//!
//! A collector protected by Kerberos answers `401` with
//! `WWW-Authenticate: Negotiate [token]`. The [`Authenticator`] produces the
//! `Authorization` credential to re-issue the request with.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use error_stack::Report;
use error_stack::ResultExt;
use tokio::process::Command;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::host_name;
use crate::error::CommError;
use crate::error::CommResult;

const NEGOTIATE: &str = "Negotiate";

/// Whether a `WWW-Authenticate` value asks for SPNEGO.
pub fn is_negotiate_challenge(value: &str) -> bool {
    let value = value.trim_start();
    value
        .get(..NEGOTIATE.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(NEGOTIATE))
}

/// Server token carried by a `Negotiate` challenge; empty on the first round.
pub fn negotiate_token(challenge: &str) -> Option<&str> {
    if !is_negotiate_challenge(challenge) {
        return None;
    }
    let challenge = challenge.trim_start();
    Some(challenge[NEGOTIATE.len()..].trim())
}

/// Value for the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Credential carrying a base64 SPNEGO token.
    pub fn negotiate(token: &str) -> Self {
        Self(format!("{NEGOTIATE} {token}"))
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

/// Performs the SPNEGO handshake for a collector host.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Produce a credential for `host` in answer to `challenge` (the full
    /// `WWW-Authenticate` value).
    ///
    /// # Errors
    ///
    /// Returns [`CommError::Authentication`] when no credential can be made.
    async fn handshake(&self, host: &str, challenge: &str) -> CommResult<Credential>;
}

/// Command lines used by [`KerberosCommandAuthenticator`].
#[derive(Debug, Clone)]
pub struct NegotiateConfig {
    /// Optional ticket refresh, e.g. `kinit -kt /etc/security/keytabs/ams.keytab ams`
    pub kinit_cmd: Option<String>,
    /// Prints a base64 SPNEGO token for the principal and server token passed as
    /// its last two arguments
    pub token_cmd: String,
    /// Upper bound for each command
    pub command_timeout: Duration,
}

/// Obtains SPNEGO tokens by running external Kerberos tooling.
pub struct KerberosCommandAuthenticator {
    config: NegotiateConfig,
}

impl KerberosCommandAuthenticator {
    pub fn new(config: NegotiateConfig) -> Self {
        info!(
            kinit = config.kinit_cmd.as_deref().unwrap_or("<none>"),
            token_cmd = %config.token_cmd,
            "Kerberos negotiation enabled"
        );
        Self { config }
    }

    async fn run(&self, command_line: &str, extra_args: &[&str]) -> CommResult<Output> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            Report::new(CommError::Configuration {
                message: "empty negotiation command".into(),
            })
        })?;

        let mut command = Command::new(program);
        command.args(parts).args(extra_args).kill_on_drop(true);

        let output = tokio::time::timeout(self.config.command_timeout, command.output())
            .await
            .map_err(|_| {
                Report::new(CommError::Timeout {
                    seconds: self.config.command_timeout.as_secs(),
                })
            })
            .attach_printable_lazy(|| format!("command: {program}"))?
            .change_context(CommError::Authentication {
                message: format!("failed to run '{program}'"),
            })?;

        if !output.status.success() {
            return Err(Report::new(CommError::Authentication {
                message: format!(
                    "'{program}' exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }));
        }
        Ok(output)
    }
}

#[async_trait]
impl Authenticator for KerberosCommandAuthenticator {
    async fn handshake(&self, host: &str, challenge: &str) -> CommResult<Credential> {
        if let Some(kinit) = &self.config.kinit_cmd {
            self.run(kinit, &[]).await?;
            debug!("kinit succeeded");
        }

        let principal = format!("HTTP@{}", host_name(host));
        let server_token = negotiate_token(challenge).unwrap_or_default();
        let output = self
            .run(&self.config.token_cmd, &[principal.as_str(), server_token])
            .await?;

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            warn!(%principal, "Negotiation command produced no token");
            return Err(Report::new(CommError::Authentication {
                message: format!("empty SPNEGO token for {principal}"),
            }));
        }
        STANDARD
            .decode(&token)
            .change_context(CommError::Authentication {
                message: format!("SPNEGO token for {principal} is not valid base64"),
            })?;

        debug!(%principal, "SPNEGO token obtained");
        Ok(Credential::negotiate(&token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_negotiate_challenges() {
        assert!(is_negotiate_challenge("Negotiate"));
        assert!(is_negotiate_challenge("Negotiate   "));
        assert!(is_negotiate_challenge("negotiate YIIC..."));
        assert!(!is_negotiate_challenge("Basic realm=\"x\""));
        assert!(!is_negotiate_challenge("Nego"));
    }

    #[test]
    fn extracts_server_token() {
        assert_eq!(negotiate_token("Negotiate   "), Some(""));
        assert_eq!(negotiate_token("Negotiate oYH1MIHy"), Some("oYH1MIHy"));
        assert_eq!(negotiate_token("Bearer x"), None);
    }

    #[test]
    fn credential_header_value() {
        assert_eq!(
            Credential::negotiate("YIIB").header_value(),
            "Negotiate YIIB"
        );
    }
}
