mod session;
mod events;
mod chat;
mod prompts;
pub mod links;
pub mod progress;
pub mod roadmap;
pub mod store;
#[cfg(test)]
mod tests;

pub use session::{ChatMessage, ChatRole, Transcript};
pub use events::ChatEvent;
pub use chat::{Chat, ChatState, IgnoreReason, ReplyError, SubmitOutcome};
pub use prompts::context_prompt;
pub use links::{segment, Segment};
pub use progress::{Progress, ProgressKey, ProgressTracker};
pub use roadmap::Roadmap;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
