/// Scenario tests for the chat orchestrator.
///
/// Uses ScriptedMockProvider so every scenario is deterministic and
/// requires no network access.
#[cfg(test)]
mod chat_tests {
    use std::sync::Arc;

    use roadmap_config::{ChatConfig, DEFAULT_FALLBACK_NOTICE, DEFAULT_GREETING};
    use roadmap_model::{text_reply, MockReply, ResponseEvent, Role, ScriptedMockProvider};
    use tokio::sync::mpsc;

    use crate::{
        Chat, ChatEvent, ChatRole, ChatState, IgnoreReason, Roadmap, SubmitOutcome,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    const CONTEXT: &str = "You are a roadmap assistant.";

    fn chat_with(model: ScriptedMockProvider) -> (Chat, Arc<ScriptedMockProvider>) {
        let model = Arc::new(model);
        let chat = Chat::new(model.clone(), CONTEXT, ChatConfig::default());
        (chat, model)
    }

    fn texts(chat: &Chat) -> Vec<(ChatRole, String)> {
        chat.transcript()
            .messages()
            .iter()
            .map(|m| (m.role, m.text.clone()))
            .collect()
    }

    fn sent_roles(model: &ScriptedMockProvider) -> Vec<Role> {
        let req = model.last_request().unwrap();
        req.messages.iter().map(|m| m.role).collect()
    }

    // ── Greeting ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn greeting_is_added_to_empty_transcript() {
        let (chat, model) = chat_with(ScriptedMockProvider::new(vec![]));
        assert!(chat.greet());
        assert_eq!(texts(&chat), vec![(ChatRole::Assistant, DEFAULT_GREETING.to_string())]);
        assert_eq!(model.call_count(), 0, "greeting must not contact the service");
    }

    #[tokio::test]
    async fn greeting_only_once() {
        let (chat, _) = chat_with(ScriptedMockProvider::new(vec![]));
        assert!(chat.greet());
        assert!(!chat.greet());
        assert_eq!(chat.transcript().len(), 1);
    }

    #[tokio::test]
    async fn greeting_skipped_after_conversation_started() {
        let (chat, _) = chat_with(ScriptedMockProvider::always_text("hi"));
        chat.submit("hello").await;
        assert!(!chat.greet());
        assert_eq!(chat.transcript().len(), 2);
    }

    // ── Successful turns ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn successful_submit_appends_user_then_reply() {
        let (chat, model) = chat_with(ScriptedMockProvider::always_text("Start with Python."));
        let outcome = chat.submit("Where do I start?").await;

        assert_eq!(outcome, SubmitOutcome::Replied);
        assert_eq!(
            texts(&chat),
            vec![
                (ChatRole::User, "Where do I start?".to_string()),
                (ChatRole::Assistant, "Start with Python.".to_string()),
            ]
        );
        assert_eq!(model.call_count(), 1);
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn streamed_deltas_are_concatenated() {
        let model = ScriptedMockProvider::new(vec![MockReply::Events(vec![
            ResponseEvent::TextDelta("Linear ".into()),
            ResponseEvent::TextDelta("algebra".into()),
            ResponseEvent::Done,
        ])]);
        let (chat, _) = chat_with(model);
        chat.submit("what first?").await;
        assert_eq!(chat.transcript().last().unwrap().text, "Linear algebra");
    }

    #[tokio::test]
    async fn first_request_is_primed_with_context() {
        let (chat, model) = chat_with(ScriptedMockProvider::always_text("ok"));
        chat.submit("hi").await;

        let req = model.last_request().unwrap();
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].as_text(), CONTEXT);
        assert_eq!(req.last_user_text(), Some("hi"));
    }

    #[tokio::test]
    async fn later_requests_carry_earlier_exchanges() {
        let model = ScriptedMockProvider::new(vec![
            MockReply::Events(text_reply("first answer")),
            MockReply::Events(text_reply("second answer")),
        ]);
        let (chat, model) = chat_with(model);
        chat.submit("one").await;
        chat.submit("two").await;

        assert_eq!(
            sent_roles(&model),
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        let req = model.last_request().unwrap();
        assert_eq!(req.messages[2].as_text(), "first answer");
        assert_eq!(chat.transcript().len(), 4);
    }

    #[tokio::test]
    async fn for_roadmap_primes_with_roadmap_prompt() {
        let roadmap = Roadmap::builtin().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("ok"));
        let chat = Chat::for_roadmap(model.clone(), &roadmap, ChatConfig::default()).unwrap();
        chat.submit("hi").await;

        let req = model.last_request().unwrap();
        let system = req.messages[0].as_text();
        assert!(system.contains(&roadmap.items[0].title));
    }

    // ── Ignored submissions ───────────────────────────────────────────────────

    #[tokio::test]
    async fn blank_submissions_are_ignored() {
        let (chat, model) = chat_with(ScriptedMockProvider::always_text("never"));
        for text in ["", "   ", "\n\t "] {
            assert_eq!(chat.submit(text).await, SubmitOutcome::Ignored(IgnoreReason::Blank));
        }
        assert!(chat.transcript().is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn submissions_while_awaiting_reply_are_ignored() {
        let (model, gate) = ScriptedMockProvider::new(vec![
            MockReply::Events(text_reply("slow answer")),
            MockReply::Events(text_reply("should never be requested")),
        ])
        .gated();
        let model = Arc::new(model);
        let chat = Arc::new(Chat::new(model.clone(), CONTEXT, ChatConfig::default()));

        let first = {
            let chat = Arc::clone(&chat);
            tokio::spawn(async move { chat.submit("first").await })
        };
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(chat.state(), ChatState::AwaitingReply);

        assert_eq!(chat.submit("second").await, SubmitOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(chat.submit("").await, SubmitOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(chat.transcript().len(), 1);

        gate.add_permits(1);
        assert_eq!(first.await.unwrap(), SubmitOutcome::Replied);
        assert_eq!(model.call_count(), 1);
        assert_eq!(
            texts(&chat),
            vec![
                (ChatRole::User, "first".to_string()),
                (ChatRole::Assistant, "slow answer".to_string()),
            ]
        );
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submits_send_a_single_request() {
        let (model, gate) = ScriptedMockProvider::always_text("only answer").gated();
        let model = Arc::new(model);
        let chat = Arc::new(Chat::new(model.clone(), CONTEXT, ChatConfig::default()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let chat = Arc::clone(&chat);
                tokio::spawn(async move { chat.submit(&format!("question {i}")).await })
            })
            .collect();
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gate.add_permits(16);

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }
        let replied = outcomes.iter().filter(|o| **o == SubmitOutcome::Replied).count();
        let busy = outcomes
            .iter()
            .filter(|o| **o == SubmitOutcome::Ignored(IgnoreReason::Busy))
            .count();
        assert_eq!((replied, busy), (1, 15));
        assert_eq!(model.call_count(), 1);
        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn user_text_is_kept_verbatim() {
        let (chat, model) = chat_with(ScriptedMockProvider::always_text("ok"));
        chat.submit("  indented question\t").await;
        assert_eq!(chat.transcript().messages()[0].text, "  indented question\t");
        assert_eq!(model.last_request().unwrap().last_user_text(), Some("  indented question\t"));
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn request_failure_appends_fallback_notice() {
        let (chat, model) = chat_with(ScriptedMockProvider::failing("503 Service Unavailable"));
        let outcome = chat.submit("hello").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(
            texts(&chat),
            vec![
                (ChatRole::User, "hello".to_string()),
                (ChatRole::Assistant, DEFAULT_FALLBACK_NOTICE.to_string()),
            ]
        );
        assert_eq!(model.call_count(), 1, "failures are not retried");
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let model = ScriptedMockProvider::new(vec![MockReply::Events(vec![ResponseEvent::Done])]);
        let (chat, _) = chat_with(model);
        assert_eq!(chat.submit("hello").await, SubmitOutcome::Failed);
        assert_eq!(chat.transcript().last().unwrap().text, DEFAULT_FALLBACK_NOTICE);
    }

    #[tokio::test]
    async fn broken_stream_discards_partial_text() {
        let model = ScriptedMockProvider::new(vec![MockReply::BreakAfter(
            vec![ResponseEvent::TextDelta("half an ans".into())],
            "connection reset".into(),
        )]);
        let (chat, _) = chat_with(model);
        assert_eq!(chat.submit("hello").await, SubmitOutcome::Failed);
        let last = chat.transcript().last().cloned().unwrap();
        assert_eq!(last.text, DEFAULT_FALLBACK_NOTICE);
        assert!(!chat.transcript().messages().iter().any(|m| m.text.contains("half")));
    }

    #[tokio::test]
    async fn session_restarts_after_failure() {
        let model = ScriptedMockProvider::new(vec![
            MockReply::Events(text_reply("first")),
            MockReply::Fail("timeout".into()),
            MockReply::Events(text_reply("recovered")),
        ]);
        let (chat, model) = chat_with(model);

        chat.submit("one").await;
        chat.submit("two").await;
        assert_eq!(chat.submit("three").await, SubmitOutcome::Replied);

        // The failed session was dropped; the new one starts from the primer.
        assert_eq!(sent_roles(&model), vec![Role::System, Role::User]);
        assert_eq!(chat.transcript().len(), 6, "transcript keeps everything shown to the user");
    }

    #[tokio::test]
    async fn configured_fallback_notice_is_used() {
        let model = Arc::new(ScriptedMockProvider::failing("down"));
        let config = ChatConfig { fallback_notice: "Service unavailable.".into(), ..ChatConfig::default() };
        let chat = Chat::new(model, CONTEXT, config);
        chat.submit("hi").await;
        assert_eq!(chat.transcript().last().unwrap().text, "Service unavailable.");
    }

    #[tokio::test]
    async fn blank_configured_fallback_uses_default() {
        let model = Arc::new(ScriptedMockProvider::failing("down"));
        let config = ChatConfig { fallback_notice: "  ".into(), ..ChatConfig::default() };
        let chat = Chat::new(model, CONTEXT, config);
        chat.submit("hi").await;
        assert_eq!(chat.transcript().last().unwrap().text, DEFAULT_FALLBACK_NOTICE);
    }

    #[tokio::test]
    async fn abandoned_request_returns_to_idle() {
        let (model, _gate) = ScriptedMockProvider::always_text("never delivered").gated();
        let model = Arc::new(model);
        let chat = Arc::new(Chat::new(model.clone(), CONTEXT, ChatConfig::default()));

        let task = {
            let chat = Arc::clone(&chat);
            tokio::spawn(async move { chat.submit("hello").await })
        };
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(chat.state(), ChatState::Idle);
        assert_eq!(chat.transcript().len(), 1);
    }

    // ── Events ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn events_follow_transcript_order() {
        let model = ScriptedMockProvider::new(vec![
            MockReply::Events(text_reply("answer")),
            MockReply::Fail("down".into()),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let chat = Chat::new(Arc::new(model), CONTEXT, ChatConfig::default()).with_events(tx);

        chat.greet();
        chat.submit("q1").await;
        chat.submit("   ").await;
        chat.submit("q2").await;
        drop(chat);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                ChatEvent::Greeting(_) => "greeting",
                ChatEvent::UserMessage(_) => "user",
                ChatEvent::Reply(_) => "reply",
                ChatEvent::Fallback(_) => "fallback",
            })
            .collect();
        assert_eq!(kinds, vec!["greeting", "user", "reply", "user", "fallback"]);
        assert_eq!(events[2].message().text, "answer");
    }
}
