mod aistudio;
mod antigravity;
mod claude;
mod claudecode;
mod codex;
mod custom;
mod deepseek;
mod geminicli;
mod http_client;
mod nvidia;
mod oauth_common;
mod openai;
mod vertex;
mod vertexexpress;

pub use aistudio::AIStudioProvider;
pub use antigravity::AntigravityProvider;
pub use claude::ClaudeProvider;
pub use claudecode::ClaudeCodeProvider;
pub use codex::CodexProvider;
pub use custom::CustomProvider;
pub use deepseek::DeepSeekProvider;
pub use geminicli::GeminiCliProvider;
pub use nvidia::NvidiaProvider;
pub use openai::OpenAIProvider;
pub use vertex::VertexProvider;
pub use vertexexpress::VertexExpressProvider;
