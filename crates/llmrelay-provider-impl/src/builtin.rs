//! Default provider rows seeded into storage on first boot.
//!
//! These mirror the builtin [`UpstreamProvider`](llmrelay_provider_core::UpstreamProvider)
//! implementations registered by [`register_builtin_providers`](crate::register_builtin_providers):
//! one row per provider, with an empty channel config (operators add credentials
//! and override `base_url` afterwards through the admin API). Providers are seeded
//! disabled — a provider only starts serving traffic once it has at least one
//! active credential attached.

use llmrelay_provider_core::config::{
    AIStudioConfig, AntigravityConfig, ClaudeCodeConfig, ClaudeConfig, CodexConfig, DeepSeekConfig,
    GeminiCliConfig, NvidiaConfig, OpenAIConfig, ProviderConfig, VertexConfig, VertexExpressConfig,
};

pub struct BuiltinProviderSeed {
    pub name: &'static str,
    pub config_json: serde_json::Value,
    pub enabled: bool,
}

fn seed(name: &'static str, config: ProviderConfig) -> BuiltinProviderSeed {
    BuiltinProviderSeed {
        name,
        config_json: serde_json::to_value(config)
            .unwrap_or_else(|e| panic!("builtin provider seed {name} does not serialize: {e}")),
        enabled: false,
    }
}

/// The full catalogue of providers this build ships with, seeded into storage
/// the first time a machine boots. `custom` (OpenAI-compatible vendors such as
/// groq/xai/mistral/together/openrouter/...) is operator-configured per
/// connection rather than seeded here, since it has no fixed base URL.
pub fn builtin_provider_seeds() -> Vec<BuiltinProviderSeed> {
    vec![
        seed("openai", ProviderConfig::OpenAI(OpenAIConfig::default())),
        seed("claude", ProviderConfig::Claude(ClaudeConfig::default())),
        seed(
            "aistudio",
            ProviderConfig::AIStudio(AIStudioConfig::default()),
        ),
        seed(
            "vertexexpress",
            ProviderConfig::VertexExpress(VertexExpressConfig::default()),
        ),
        seed("vertex", ProviderConfig::Vertex(VertexConfig::default())),
        seed(
            "geminicli",
            ProviderConfig::GeminiCli(GeminiCliConfig::default()),
        ),
        seed(
            "claudecode",
            ProviderConfig::ClaudeCode(ClaudeCodeConfig::default()),
        ),
        seed("codex", ProviderConfig::Codex(CodexConfig::default())),
        seed(
            "antigravity",
            ProviderConfig::Antigravity(AntigravityConfig::default()),
        ),
        seed("nvidia", ProviderConfig::Nvidia(NvidiaConfig::default())),
        seed(
            "deepseek",
            ProviderConfig::DeepSeek(DeepSeekConfig::default()),
        ),
    ]
}
