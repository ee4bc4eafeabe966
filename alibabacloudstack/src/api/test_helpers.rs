//! Test helpers for the RPC API

use super::client::{Client, ClientConfig};
use mockito::Matcher;
use std::collections::HashMap;
use std::time::Duration;

/// A client whose every product endpoint points at `url`
pub fn create_test_client(url: &str) -> Client {
    let endpoints: HashMap<String, String> = super::Product::all()
        .iter()
        .map(|p| (p.endpoint_key().to_string(), url.to_string()))
        .collect();

    Client::new(ClientConfig {
        access_key: "test-access-key".to_string(),
        secret_key: "test-secret-key".to_string(),
        region: "cn-test-1".to_string(),
        protocol: "HTTP".to_string(),
        department: Some("11".to_string()),
        resource_group: Some("7".to_string()),
        endpoints,
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

/// Matches one `key=value` pair in a form-encoded request body
pub fn form_param(key: &str, value: &str) -> Matcher {
    Matcher::UrlEncoded(key.to_string(), value.to_string())
}
