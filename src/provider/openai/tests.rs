use super::*;

fn openai_config() -> ProviderConfig {
    ProviderConfig {
        api_key: "sk-test-1234567890".to_string(),
        organization: Some("org-42".to_string()),
        ..ProviderConfig::default()
    }
}

fn azure_config() -> ProviderConfig {
    ProviderConfig {
        api_key: "azure-key".to_string(),
        api_base: "https://example.openai.azure.com/".to_string(),
        api_type: ApiType::Azure,
        auth_type: AuthType::Azure,
        deployment: Some("gpt4".to_string()),
        api_version: Some("2024-05-01-preview".to_string()),
        organization: None,
    }
}

#[test]
fn client_configuration() {
    let client = OpenAiClient::new(&openai_config())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(5)
        .with_embedding_model("text-embedding-3-small");

    assert_eq!(client.retry_attempts, 5);
    assert_eq!(client.embedding_model, "text-embedding-3-small");
    assert_eq!(client.base_url.host_str(), Some("api.openai.com"));
}

#[test]
fn rejects_invalid_config() {
    let result = OpenAiClient::new(&ProviderConfig::default());
    assert!(matches!(result, Err(CopilotError::Config(_))));
}

#[test]
fn openai_endpoints() {
    let client = OpenAiClient::new(&openai_config()).expect("client");
    assert_eq!(
        client.endpoint("assistants").expect("url").as_str(),
        "https://api.openai.com/v1/assistants"
    );
    assert_eq!(
        client
            .endpoint("threads/t1/messages?order=desc&limit=1")
            .expect("url")
            .as_str(),
        "https://api.openai.com/v1/threads/t1/messages?order=desc&limit=1"
    );
}

#[test]
fn azure_endpoints_carry_api_version() {
    let client = OpenAiClient::new(&azure_config()).expect("client");
    assert_eq!(
        client.endpoint("assistants").expect("url").as_str(),
        "https://example.openai.azure.com/openai/assistants?api-version=2024-05-01-preview"
    );
    assert_eq!(
        client
            .endpoint("vector_stores?limit=100")
            .expect("url")
            .as_str(),
        "https://example.openai.azure.com/openai/vector_stores?limit=100&api-version=2024-05-01-preview"
    );
}

#[test]
fn openai_auth_headers() {
    let client = OpenAiClient::new(&openai_config()).expect("client");
    let headers = client.auth_headers();
    assert!(headers.contains(&("Authorization", "Bearer sk-test-1234567890".to_string())));
    assert!(headers.contains(&("OpenAI-Beta", "assistants=v2".to_string())));
    assert!(headers.contains(&("OpenAI-Organization", "org-42".to_string())));
}

#[test]
fn azure_auth_headers() {
    let client = OpenAiClient::new(&azure_config()).expect("client");
    assert_eq!(
        client.auth_headers(),
        vec![("api-key", "azure-key".to_string())]
    );

    let ad = ProviderConfig {
        auth_type: AuthType::AzureAd,
        ..azure_config()
    };
    let client = OpenAiClient::new(&ad).expect("client");
    assert_eq!(
        client.auth_headers(),
        vec![("Authorization", "Bearer azure-key".to_string())]
    );
}

#[test]
fn provider_error_uses_error_body() {
    let err = provider_error(
        429,
        r#"{"error":{"message":"Rate limit reached","code":"rate_limit_exceeded"}}"#,
    );
    assert_eq!(
        err.to_string(),
        "Provider error: HTTP 429 (rate_limit_exceeded): Rate limit reached"
    );

    let err = provider_error(502, "<html>bad gateway</html>");
    assert_eq!(err.to_string(), "Provider error: HTTP 502");
}

#[test]
fn multipart_body_layout() {
    let body = multipart_body("XYZ", "Get-Item.txt", b"help text");
    let text = String::from_utf8(body).expect("utf8");
    assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"purpose\""));
    assert!(text.contains("filename=\"Get-Item.txt\""));
    assert!(text.contains("\r\n\r\nhelp text\r\n--XYZ--\r\n"));
}

#[test]
fn message_text_is_flattened() {
    let message: MessageObject = serde_json::from_str(
        r#"{
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "text", "text": {"value": "first", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "second", "annotations": []}}
            ]
        }"#,
    )
    .expect("parse message");

    let message = ThreadMessage::from(message);
    assert_eq!(message.role, MessageRole::Assistant);
    assert_eq!(message.text, "first\nsecond");
}

#[test]
fn run_parses_unknown_status() {
    let run: Run = serde_json::from_str(r#"{"id": "run_1", "status": "something_new"}"#)
        .expect("parse run");
    assert_eq!(run.status, crate::provider::RunStatus::Unknown);
    assert!(!run.status.is_terminal());
}
