//! `hadoop.auth` cookie handling.
//!
//! After a successful SPNEGO exchange the collector hands out a signed
//! `hadoop.auth` cookie. Replaying it lets later submissions skip the
//! handshake until the server rejects it.

/// Name of the Hadoop authentication cookie.
pub const HADOOP_AUTH_COOKIE: &str = "hadoop.auth";

/// Extracts `hadoop.auth=<value>` from `Set-Cookie` header values, ready to be
/// sent back as a `Cookie` header.
pub fn hadoop_auth_cookie<'a>(set_cookie: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookie.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        if name.trim() != HADOOP_AUTH_COOKIE {
            return None;
        }
        let value = value.trim();
        if value.is_empty() || value == "\"\"" {
            return None;
        }
        Some(format!("{HADOOP_AUTH_COOKIE}={value}"))
    })
}
