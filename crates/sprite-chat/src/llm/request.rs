//! Per-shape request assembly.
//!
//! [`build_request`] is a pure function of its inputs: it never performs IO
//! and never mutates the history. An empty API key still yields a complete
//! descriptor; authentication failures surface at the transport layer.

use serde_json::{Value, json};

use crate::config::{ProviderConfig, RequestShape};
use crate::llm::message::Message;

const SSE_ACCEPT: (&str, &str) = ("Accept", "text/event-stream");

/// Everything the transport needs for one provider call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Build the provider-specific request for one turn.
///
/// `history` holds the prior visible conversation (the new user text is
/// passed separately and always serialized last). Failure notices are
/// skipped; everything else is forwarded in order, consecutive same-role
/// entries included.
pub fn build_request(
    config: &ProviderConfig,
    system_prompt: &str,
    history: &[Message],
    user_text: &str,
) -> RequestDescriptor {
    match config.shape {
        RequestShape::OpenAi => build_openai(config, system_prompt, history, user_text),
        RequestShape::Anthropic => build_anthropic(config, system_prompt, history, user_text),
        RequestShape::DashScope => build_dashscope(config, system_prompt, history, user_text),
        RequestShape::Generic => build_generic(config, system_prompt, history, user_text),
    }
}

fn build_openai(
    config: &ProviderConfig,
    system_prompt: &str,
    history: &[Message],
    user_text: &str,
) -> RequestDescriptor {
    let mut messages = vec![json!({"role": "system", "content": system_prompt})];
    messages.extend(visible(history).map(role_content));
    messages.push(json!({"role": "user", "content": user_text}));

    let body = json!({
        "model": config.model,
        "messages": messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "top_p": config.top_p,
        "stream": true,
    });

    // Proxied requests target the proxy endpoint and carry no credentials;
    // the proxy injects its own.
    let (url, headers) = match &config.proxy_url {
        Some(proxy) => (proxy.clone(), vec![header(SSE_ACCEPT)]),
        None => (
            config.api_url.clone(),
            with_extra_headers(config, vec![bearer(config), header(SSE_ACCEPT)]),
        ),
    };

    RequestDescriptor { url, headers, body }
}

fn build_anthropic(
    config: &ProviderConfig,
    system_prompt: &str,
    history: &[Message],
    user_text: &str,
) -> RequestDescriptor {
    let prompt = flatten_history(system_prompt, history, user_text);
    let body = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": [{"role": "user", "content": prompt}],
        "stream": true,
    });

    let headers = with_extra_headers(
        config,
        vec![
            ("x-api-key".to_string(), config.api_key.clone()),
            header(SSE_ACCEPT),
        ],
    );

    RequestDescriptor {
        url: config.api_url.clone(),
        headers,
        body,
    }
}

fn build_dashscope(
    config: &ProviderConfig,
    system_prompt: &str,
    history: &[Message],
    user_text: &str,
) -> RequestDescriptor {
    let mut messages = vec![json!({"role": "system", "content": system_prompt})];
    messages.extend(visible(history).map(role_content));
    messages.push(json!({"role": "user", "content": user_text}));

    let body = json!({
        "model": config.model,
        "input": {"messages": messages},
        "parameters": {
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "top_p": config.top_p,
        },
    });

    let headers = with_extra_headers(
        config,
        vec![
            bearer(config),
            ("X-DashScope-SSE".to_string(), "enable".to_string()),
        ],
    );

    RequestDescriptor {
        url: config.api_url.clone(),
        headers,
        body,
    }
}

fn build_generic(
    config: &ProviderConfig,
    system_prompt: &str,
    history: &[Message],
    user_text: &str,
) -> RequestDescriptor {
    let prompt = flatten_history(system_prompt, history, user_text);
    let body = json!({
        "messages": [{"role": "user", "content": prompt}],
        "temperature": config.temperature,
        "top_p": config.top_p,
    });

    RequestDescriptor {
        url: config.api_url.clone(),
        headers: with_extra_headers(config, vec![bearer(config)]),
        body,
    }
}

/// Collapse the system prompt and history into one `"role: content"` block.
///
/// Role structure is intentionally dropped here to fit single-message APIs.
/// A user line that itself looks like `assistant: ...` is forwarded
/// verbatim and cannot be distinguished by the provider.
fn flatten_history(system_prompt: &str, history: &[Message], user_text: &str) -> String {
    let lines: Vec<String> = visible(history)
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect();
    format!(
        "{system_prompt}\n\n{}\n\nuser: {user_text}",
        lines.join("\n")
    )
}

fn visible(history: &[Message]) -> impl Iterator<Item = &Message> {
    history.iter().filter(|m| !m.error)
}

fn role_content(message: &Message) -> Value {
    json!({"role": message.role.as_str(), "content": message.content})
}

fn bearer(config: &ProviderConfig) -> (String, String) {
    (
        "Authorization".to_string(),
        format!("Bearer {}", config.api_key),
    )
}

fn header((name, value): (&str, &str)) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn with_extra_headers(
    config: &ProviderConfig,
    mut headers: Vec<(String, String)>,
) -> Vec<(String, String)> {
    headers.extend(config.extra_headers.iter().cloned());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RequestShape};

    fn config(shape: RequestShape) -> ProviderConfig {
        ProviderConfig::new(
            "test",
            shape,
            "https://api.example.com/chat",
            "test-model",
        )
        .with_api_key("secret")
    }

    fn history() -> Vec<Message> {
        vec![Message::user("hello"), Message::assistant("hi there")]
    }

    fn header_value<'a>(request: &'a RequestDescriptor, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn openai_body_keeps_role_structure() {
        let request = build_request(&config(RequestShape::OpenAi), "sys", &history(), "next");

        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "sys");
        assert_eq!(messages[1]["content"], "hello");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3], json!({"role": "user", "content": "next"}));
        assert_eq!(request.body["stream"], true);
        assert_eq!(request.body["max_tokens"], 1500);
        assert_eq!(header_value(&request, "Authorization"), Some("Bearer secret"));
        assert_eq!(header_value(&request, "Accept"), Some("text/event-stream"));
    }

    #[test]
    fn anthropic_flattens_history_into_one_user_message() {
        let request = build_request(&config(RequestShape::Anthropic), "sys", &history(), "next");

        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(
            messages[0]["content"],
            "sys\n\nuser: hello\nassistant: hi there\n\nuser: next"
        );
        assert_eq!(header_value(&request, "x-api-key"), Some("secret"));
        assert!(header_value(&request, "Authorization").is_none());
    }

    #[test]
    fn dashscope_nests_messages_and_parameters() {
        let request = build_request(&config(RequestShape::DashScope), "sys", &history(), "next");

        let messages = request.body["input"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(request.body["parameters"]["top_p"], 0.8);
        assert!(request.body.get("stream").is_none());
        assert_eq!(header_value(&request, "X-DashScope-SSE"), Some("enable"));
        assert_eq!(header_value(&request, "Authorization"), Some("Bearer secret"));
    }

    #[test]
    fn generic_body_has_no_model_or_stream_field() {
        let request = build_request(&config(RequestShape::Generic), "sys", &history(), "next");

        assert!(request.body.get("model").is_none());
        assert!(request.body.get("stream").is_none());
        assert_eq!(request.body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn failure_notices_are_excluded_from_serialization() {
        let mut history = history();
        history.push(Message::error_notice("Sorry, that failed"));
        history.push(Message::user("again"));

        let request = build_request(&config(RequestShape::OpenAi), "sys", &history, "next");
        let messages = request.body["messages"].as_array().unwrap();
        assert!(
            messages
                .iter()
                .all(|m| m["content"] != "Sorry, that failed")
        );
        assert_eq!(messages.len(), 5);

        let request = build_request(&config(RequestShape::Anthropic), "sys", &history, "next");
        let flattened = request.body["messages"][0]["content"].as_str().unwrap();
        assert!(!flattened.contains("that failed"));
    }

    #[test]
    fn empty_api_key_still_builds_a_descriptor() {
        let config = ProviderConfig::new(
            "test",
            RequestShape::OpenAi,
            "https://api.example.com/chat",
            "m",
        );
        let request = build_request(&config, "sys", &[], "hi");
        assert_eq!(header_value(&request, "Authorization"), Some("Bearer "));
    }

    #[test]
    fn proxy_url_replaces_endpoint_and_drops_credentials() {
        let config = config(RequestShape::OpenAi).with_proxy_url("https://proxy.example.com/chat");
        let request = build_request(&config, "sys", &[], "hi");

        assert_eq!(request.url, "https://proxy.example.com/chat");
        assert!(header_value(&request, "Authorization").is_none());
        assert_eq!(header_value(&request, "Accept"), Some("text/event-stream"));
    }

    #[test]
    fn extra_headers_are_appended() {
        let config = config(RequestShape::Anthropic).with_header("anthropic-version", "2023-06-01");
        let request = build_request(&config, "sys", &[], "hi");
        assert_eq!(
            header_value(&request, "anthropic-version"),
            Some("2023-06-01")
        );
    }
}
