mod types;
mod provider;
mod google;
mod mock;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use google::GoogleProvider;
pub use mock::{text_reply, MockProvider, MockReply, ScriptedMockProvider};

use anyhow::bail;
use roadmap_config::ModelConfig;

/// Build the provider named by `cfg.provider`: `"google"`/`"gemini"` for
/// [`GoogleProvider`], `"mock"` for the offline [`MockProvider`].
///
/// A missing API key is not an error here; the Gemini driver reports it on
/// the first request.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    let key = resolve_api_key(cfg);
    match cfg.provider.as_str() {
        "google" | "gemini" => Ok(Box::new(GoogleProvider::new(
            cfg.name.clone(),
            key,
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        "mock" => Ok(Box::new(MockProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}

/// Inline key first, then the named environment variable.  Blank values
/// count as unset.
fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    let present = |k: &String| !k.trim().is_empty();
    cfg.api_key.clone().filter(present).or_else(|| {
        cfg.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(present)
    })
}
