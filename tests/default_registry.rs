mod support;

use std::sync::Arc;

use q::config::ConfigStore;
use q::{LLMError, default_registry};
use tokio_util::sync::CancellationToken;

use support::{FakeResponse, FakeTransport, no_credentials};

#[test]
fn built_in_providers_are_listed_in_name_order() {
    let registry = default_registry(FakeTransport::idle(), no_credentials());
    assert_eq!(registry.names(), vec!["anthropic", "google", "openai"]);

    let models = registry.qualified_models();
    assert!(models.contains(&"openai/gpt-4o".to_string()));
    assert!(models.contains(&"anthropic/claude-sonnet-4-20250514".to_string()));
    assert!(models.contains(&"google/gemini-2.5-pro".to_string()));
    assert!(models.first().is_some_and(|model| model.starts_with("anthropic/")));
    assert!(models.last().is_some_and(|model| model.starts_with("openai/")));
}

#[test]
fn resolve_rejects_models_of_another_vendor() {
    let registry = default_registry(FakeTransport::idle(), no_credentials());
    let err = registry
        .resolve("openai/gemini-2.0-flash")
        .err()
        .expect("cross-vendor model");
    assert!(matches!(err, LLMError::Validation { .. }));
    assert!(err.to_string().contains("q models list"));
}

#[tokio::test]
async fn keys_saved_to_the_config_file_are_used_on_the_next_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ConfigStore::new(dir.path().join("q").join("config.json")));
    let transport = FakeTransport::with_responses([FakeResponse::json(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#,
    )]);
    let registry = default_registry(transport.clone(), store.clone());
    let (provider, model) = registry.resolve("openai/gpt-4o-mini").expect("resolve");
    let cancel = CancellationToken::new();

    let err = provider
        .prompt(&cancel, &model, "ping")
        .await
        .expect_err("no key yet");
    assert!(err.is_credential_error());
    assert_eq!(transport.calls(), 0);

    store.set_api_key("openai", "sk-from-file").expect("save key");
    let reply = provider
        .prompt(&cancel, &model, "ping")
        .await
        .expect("key is picked up");
    assert_eq!(reply, "pong");
    assert_eq!(
        transport.requests()[0].headers["Authorization"],
        "Bearer sk-from-file"
    );
}
