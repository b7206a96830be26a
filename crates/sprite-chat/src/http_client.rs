use std::time::Duration;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "SPRITE_CHAT_DISABLE_SYSTEM_PROXY";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for provider calls.
///
/// No overall request timeout: a streamed response stays open for as long as
/// the provider keeps generating. Only the connection attempt is bounded.
pub(crate) fn build_http_client() -> Client {
    let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if disable_system_proxy() {
        builder = builder.no_proxy();
    }
    builder.build().expect("Failed to build reqwest client")
}

fn disable_system_proxy() -> bool {
    std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() || cfg!(test)
}
