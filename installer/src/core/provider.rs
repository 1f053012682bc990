//! The `cursor-acp` provider entry written into `opencode.json`.

use serde_json::{Map, Value, json};

const PROVIDER_SCHEMA: &str = include_str!("../../schemas/provider.schema.json");

/// Provider key under `provider` in the host config.
pub const PROVIDER_ID: &str = "cursor-acp";
/// AI SDK adapter package the host loads for this provider.
pub const PROVIDER_NPM: &str = "@ai-sdk/openai-compatible";
pub const PROVIDER_NAME: &str = "Cursor Agent (ACP stdin)";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:32123/v1";

/// `(model id, display name)` pairs exposed through the provider.
pub const MODELS: &[(&str, &str)] = &[
    ("auto", "Cursor Agent Auto"),
    ("composer-1", "Cursor Agent Composer 1"),
    ("deepseek-v3.2", "Cursor Agent DeepSeek V3.2"),
    ("gemini-3-flash", "Cursor Agent Gemini 3 Flash"),
    ("gemini-3-pro", "Cursor Agent Gemini 3 Pro"),
    ("gemini-3-pro-preview", "Cursor Agent Gemini 3 Pro Preview"),
    ("gpt-5", "Cursor Agent GPT-5 (alias → gpt-5.2)"),
    ("gpt-5-mini", "Cursor Agent GPT-5 Mini"),
    ("gpt-5-pro", "Cursor Agent GPT-5 Pro"),
    ("gpt-5.1", "Cursor Agent GPT-5.1"),
    ("gpt-5.1-codex", "Cursor Agent GPT-5.1 Codex"),
    ("gpt-5.1-codex-max-xhigh", "Cursor Agent GPT-5.1 Codex Max XHigh"),
    ("gpt-5.1-codex-mini-high", "Cursor Agent GPT-5.1 Codex Mini High"),
    ("gpt-5.1-high", "Cursor Agent GPT-5.1 High"),
    ("gpt-5.2", "Cursor Agent GPT-5.2"),
    ("gpt-5.2-codex", "Cursor Agent GPT-5.2 Codex"),
    ("gpt-5.2-high", "Cursor Agent GPT-5.2 High"),
    ("gpt-5.2-xhigh", "Cursor Agent GPT-5.2 XHigh"),
    ("grok-4", "Cursor Agent Grok 4"),
    ("grok-4-fast", "Cursor Agent Grok 4 Fast"),
    ("grok-code", "Cursor Agent Grok Code"),
    ("grok-code-fast", "Cursor Agent Grok Code Fast"),
    ("haiku-4.5", "Cursor Agent Claude 4.5 Haiku"),
    ("kimi-k2", "Cursor Agent Kimi K2"),
    ("opus-4.5", "Cursor Agent Claude 4.5 Opus"),
    ("opus-4.5-thinking", "Cursor Agent Claude 4.5 Opus Thinking"),
    ("sonnet-4.5", "Cursor Agent Claude 4.5 Sonnet"),
    ("sonnet-4.5-thinking", "Cursor Agent Claude 4.5 Sonnet Thinking"),
];

/// Build the provider entry pointing the host at the local proxy on `base_url`.
pub fn provider_spec(base_url: &str) -> Value {
    let models: Map<String, Value> = MODELS
        .iter()
        .map(|(id, name)| ((*id).to_string(), json!({ "name": name })))
        .collect();
    json!({
        "npm": PROVIDER_NPM,
        "name": PROVIDER_NAME,
        "options": { "baseURL": base_url },
        "models": models,
    })
}

/// Check a provider entry against the embedded JSON Schema.
///
/// Returns one message per violation; an empty list means the entry is well formed.
pub fn validate_provider_entry(entry: &Value) -> Vec<String> {
    let schema: Value = match serde_json::from_str(PROVIDER_SCHEMA) {
        Ok(schema) => schema,
        Err(err) => return vec![format!("invalid provider schema: {err}")],
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(err) => return vec![format!("invalid provider schema: {err}")],
    };
    validator
        .iter_errors(entry)
        .map(|err| err.to_string())
        .collect()
}
