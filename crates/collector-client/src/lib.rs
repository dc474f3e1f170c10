//! HTTP client for metrics collector hosts.
//!
//! This library covers everything the agent needs to put bytes on the wire:
//!
//! - Turning a collector host identifier into a submission URL
//! - A single-shot POST transport that reports status and auth headers
//! - SPNEGO/Kerberos negotiation through external tooling
//! - `hadoop.auth` cookie extraction for authenticated sessions
//!
//! Retry, failover and host blacklisting are left to the caller.
//!
//! # Examples
//!
//! ```no_run
//! # use collector_client::{ClientConfig, CollectorTransport, CommResult, HttpTransport, SubmitHeaders};
//! # async fn example() -> CommResult<()> {
//! let transport = HttpTransport::new(ClientConfig::new())?;
//! let response = transport
//!     .submit("c6401.ambari.apache.org", r#"{"metrics":[]}"#, &SubmitHeaders::default())
//!     .await?;
//! assert!(response.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cookie;
pub mod error;
pub mod negotiate;
pub mod transport;

pub use config::ClientConfig;
pub use config::Protocol;
pub use error::CommError;
pub use error::CommResult;
pub use negotiate::Authenticator;
pub use negotiate::Credential;
pub use negotiate::KerberosCommandAuthenticator;
pub use negotiate::NegotiateConfig;
pub use transport::encode_payload;
pub use transport::CollectorTransport;
pub use transport::HttpTransport;
pub use transport::SubmitHeaders;
pub use transport::SubmitResponse;
