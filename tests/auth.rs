mod common;

use std::net::TcpListener;

use common::mock_endpoint;
use serde_json::json;
use wfauth::{Authenticator, Credentials, Error};

fn local(url: &str) -> Authenticator {
    Authenticator::with_client(common::no_proxy(), url).unwrap()
}

#[tokio::test]
async fn posts_credentials_as_json() -> anyhow::Result<()> {
    let (url, rx) = mock_endpoint(200, r#"{"access_token":"t1"}"#);
    let creds = Credentials::from_lookup(|key| match key {
        "CLIENT_ID" => Some("abc".to_string()),
        "CLIENT_SECRET" => Some("xyz".to_string()),
        "CLIENT_EMAIL" => Some("a@b.com".to_string()),
        _ => None,
    });

    local(&url).authenticate(&creds).await?;

    let captured = rx.recv()?;
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.header("Content-Type"), Some("application/json"));
    assert_eq!(
        captured.body,
        r#"{"clientId":"abc","clientSecret":"xyz","email":["a@b.com"]}"#
    );
    Ok(())
}

#[tokio::test]
async fn returns_response_verbatim() -> anyhow::Result<()> {
    let (url, _rx) = mock_endpoint(200, r#"{"access_token":"t1"}"#);

    let response = local(&url)
        .authenticate(&Credentials::new("abc", "xyz", "a@b.com"))
        .await?;

    assert_eq!(response.value(), &json!({"access_token": "t1"}));
    assert_eq!(response.access_token(), Some("t1"));
    assert_eq!(response.to_string(), r#"{"access_token":"t1"}"#);
    Ok(())
}

#[tokio::test]
async fn opaque_response_without_token_is_accepted() -> anyhow::Result<()> {
    let (url, _rx) = mock_endpoint(200, r#"{"ok":true,"items":[1,2]}"#);

    let response = local(&url)
        .authenticate(&Credentials::default())
        .await?;

    assert_eq!(response.access_token(), None);
    assert_eq!(response.into_value(), json!({"ok": true, "items": [1, 2]}));
    Ok(())
}

#[tokio::test]
async fn rejected_request_is_not_retried() -> anyhow::Result<()> {
    let (url, rx) = mock_endpoint(401, r#"{"error":"invalid_client"}"#);

    let err = local(&url)
        .authenticate(&Credentials::new("abc", "wrong", "a@b.com"))
        .await
        .unwrap_err();

    match &err {
        Error::Status { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, r#"{"error":"invalid_client"}"#);
        }
        other => panic!("expected a status error, got {other:?}"),
    }
    assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
    assert_eq!(rx.try_iter().count(), 1);
    Ok(())
}

#[tokio::test]
async fn unset_email_is_sent_as_null() -> anyhow::Result<()> {
    let (url, rx) = mock_endpoint(200, "{}");
    let creds = Credentials::from_lookup(|key| match key {
        "CLIENT_ID" => Some("abc".to_string()),
        "CLIENT_SECRET" => Some("xyz".to_string()),
        _ => None,
    });

    local(&url).authenticate(&creds).await?;

    let sent: serde_json::Value = serde_json::from_str(&rx.recv()?.body)?;
    assert_eq!(sent["email"], json!([null]));
    Ok(())
}

#[tokio::test]
async fn every_call_hits_the_network() -> anyhow::Result<()> {
    let (url, rx) = mock_endpoint(200, r#"{"access_token":"t1"}"#);
    let authenticator = local(&url);
    let creds = Credentials::new("abc", "xyz", "a@b.com");

    let first = authenticator.authenticate(&creds).await?;
    let second = authenticator.authenticate(&creds).await?;

    assert_eq!(first, second);
    assert_eq!(rx.try_iter().count(), 2);
    Ok(())
}

#[tokio::test]
async fn non_json_success_is_a_decode_error() -> anyhow::Result<()> {
    let (url, _rx) = mock_endpoint(200, "<html>oops</html>");

    let err = local(&url)
        .authenticate(&Credentials::new("abc", "xyz", "a@b.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode(_)));
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() -> anyhow::Result<()> {
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

    let err = local(&format!("http://127.0.0.1:{port}/api/auth"))
        .authenticate(&Credentials::new("abc", "xyz", "a@b.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    Ok(())
}
