use std::time::Duration;

use collector_client::negotiate::NegotiateConfig;
use collector_client::Authenticator;
use collector_client::ClientConfig;
use collector_client::CollectorTransport;
use collector_client::CommError;
use collector_client::HttpTransport;
use collector_client::KerberosCommandAuthenticator;
use collector_client::SubmitHeaders;
use similar_asserts::assert_eq;
use test_log::test;
use wiremock::matchers::body_string;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

const METRICS_PATH: &str = "/ws/v1/timeline/metrics";

fn transport() -> HttpTransport {
    HttpTransport::new(ClientConfig::new().with_request_timeout(Duration::from_secs(2)))
        .expect("should create transport")
}

#[test(tokio::test)]
async fn posts_body_to_metrics_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(METRICS_PATH))
        .and(header("Content-Type", "application/json"))
        .and(body_string(r#"{"metrics":[]}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let host = server.address().to_string();
    let response = transport()
        .submit(&host, r#"{"metrics":[]}"#, &SubmitHeaders::default())
        .await
        .expect("should reach mock collector");

    assert!(response.is_success());
    assert_eq!(response.www_authenticate, None);
}

#[test(tokio::test)]
async fn reports_negotiate_challenge_and_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(METRICS_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("WWW-Authenticate", "Negotiate")
                .append_header("Set-Cookie", "hadoop.auth=; Max-Age=0"),
        )
        .mount(&server)
        .await;

    let host = server.address().to_string();
    let response = transport()
        .submit(&host, "{}", &SubmitHeaders::default())
        .await
        .expect("should reach mock collector");

    assert_eq!(response.status, 401);
    assert_eq!(response.negotiate_challenge(), Some("Negotiate"));
    assert_eq!(response.set_cookie, vec!["hadoop.auth=; Max-Age=0".to_string()]);
}

#[test(tokio::test)]
async fn sends_authorization_and_cookie_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Negotiate dG9rZW4="))
        .and(header("Cookie", "hadoop.auth=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let headers = SubmitHeaders {
        authorization: Some("Negotiate dG9rZW4=".to_string()),
        cookie: Some("hadoop.auth=abc".to_string()),
    };
    let response = transport()
        .submit(&server.address().to_string(), "{}", &headers)
        .await
        .expect("should reach mock collector");

    assert!(response.is_success());
}

#[test(tokio::test)]
async fn non_200_status_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let response = transport()
        .submit(&server.address().to_string(), "{}", &SubmitHeaders::default())
        .await
        .expect("a 500 is still a response");

    assert_eq!(response.status, 500);
    assert!(!response.is_success());
}

#[test(tokio::test)]
async fn connection_refused_is_network_error() {
    // bind then drop to obtain a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");
    drop(listener);

    let err = transport()
        .submit(&addr.to_string(), "{}", &SubmitHeaders::default())
        .await
        .expect_err("nothing listens on the port");

    assert!(
        matches!(err.current_context(), CommError::Network { .. }),
        "unexpected error: {err:?}"
    );
}

#[cfg(unix)]
#[test(tokio::test)]
async fn command_authenticator_returns_negotiate_credential() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let script = dir.path().join("token.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\n[ \"$1\" = \"HTTP@collector1\" ] || exit 3\necho dG9rZW4=\n",
    )
    .expect("should write script");

    let authenticator = KerberosCommandAuthenticator::new(NegotiateConfig {
        kinit_cmd: Some("true".to_string()),
        token_cmd: format!("sh {}", script.display()),
        command_timeout: Duration::from_secs(5),
    });

    let credential = authenticator
        .handshake("collector1:6188", "Negotiate")
        .await
        .expect("handshake should succeed");

    assert_eq!(credential.header_value(), "Negotiate dG9rZW4=");
}

#[cfg(unix)]
#[test(tokio::test)]
async fn command_authenticator_rejects_failed_kinit() {
    let authenticator = KerberosCommandAuthenticator::new(NegotiateConfig {
        kinit_cmd: Some("false".to_string()),
        token_cmd: "echo dG9rZW4=".to_string(),
        command_timeout: Duration::from_secs(5),
    });

    let err = authenticator
        .handshake("collector1", "Negotiate")
        .await
        .expect_err("kinit failure must fail the handshake");

    assert!(matches!(
        err.current_context(),
        CommError::Authentication { .. }
    ));
}

#[cfg(unix)]
#[test(tokio::test)]
async fn command_authenticator_rejects_non_base64_token() {
    let authenticator = KerberosCommandAuthenticator::new(NegotiateConfig {
        kinit_cmd: None,
        token_cmd: "echo not*base64".to_string(),
        command_timeout: Duration::from_secs(5),
    });

    let err = authenticator
        .handshake("collector1", "Negotiate")
        .await
        .expect_err("garbage token must be rejected");

    assert!(matches!(
        err.current_context(),
        CommError::Authentication { .. }
    ));
}
