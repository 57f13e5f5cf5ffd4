//! Mock completion service and session integration tests
//!
//! Sessions run on real tokio timers with millisecond pacing, so each test
//! drives a full runtime without network access.

use crate::completion::{CompletionError, CompletionRequest, CompletionService, TextStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Completion Service
// ============================================================================

type Scripted = Result<Vec<Result<String, CompletionError>>, CompletionError>;

/// Completion service that replays queued replies
#[allow(dead_code)]
pub struct MockCompletionService {
    replies: Mutex<VecDeque<Scripted>>,
    chunk_delay: Duration,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

#[allow(dead_code)]
impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            chunk_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before every fragment
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Queue a reply streamed as the given fragments
    pub fn queue_reply(&self, fragments: Vec<&str>) {
        let items = fragments.into_iter().map(|f| Ok(f.to_string())).collect();
        self.replies.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a stream with explicit items, errors included
    pub fn queue_stream(&self, items: Vec<Result<String, CompletionError>>) {
        self.replies.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a failure to open the stream
    pub fn queue_error(&self, error: CompletionError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());
        let items = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::network("No mock reply queued")))?;

        let delay = self.chunk_delay;
        let fragments = stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(fragments))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ChatMessage, CompletionBridge, Role};
    use crate::donation::donation_link;
    use crate::session::{
        SessionError, SessionHandle, SessionManager, SessionTiming, SessionView, SseEvent,
    };
    use crate::state_machine::script::{self, prompt_after};
    use crate::state_machine::{DialogueState, DonorField, DonorRecord, Event};
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    const JANE: [&str; 7] = [
        "Jane",
        "Doe",
        "jane@x.com",
        "1 Main St",
        "Springfield",
        "IL",
        "62704",
    ];

    fn fast_timing() -> SessionTiming {
        SessionTiming {
            typing_delay: Duration::from_millis(1),
            link_pause: Duration::from_millis(30),
            ..SessionTiming::default()
        }
    }

    fn manager_with(mock: &Arc<MockCompletionService>, timing: SessionTiming) -> SessionManager {
        let service: Arc<dyn CompletionService> = mock.clone();
        let bridge = CompletionBridge::new(Some(service)).with_system_prompt("PREAMBLE");
        SessionManager::new(bridge, timing)
    }

    async fn wait_for_view(
        handle: &SessionHandle,
        mut pred: impl FnMut(&SessionView) -> bool,
    ) -> SessionView {
        let mut rx = handle.watch();
        tokio::time::timeout(WAIT, async move {
            rx.wait_for(|view| pred(view)).await.map(|view| (*view).clone())
        })
        .await
        .expect("timed out waiting for session view")
        .expect("session runtime ended")
    }

    fn last_is(view: &SessionView, state: DialogueState, text: &str) -> bool {
        view.state == state && view.last_text() == Some(text)
    }

    /// Open a session and wait for the welcome menu
    async fn open_at_menu(manager: &SessionManager) -> SessionHandle {
        let handle = manager.open().await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Options, "General Inquiries")).await;
        handle
    }

    async fn say(handle: &SessionHandle, text: &str) {
        handle
            .send(Event::UserInput {
                text: text.to_string(),
            })
            .await
            .unwrap();
    }

    async fn select(handle: &SessionHandle, option: &str) {
        handle
            .send(Event::OptionSelected {
                option: option.to_string(),
            })
            .await
            .unwrap();
    }

    /// Walk the donation questions up to the confirm buttons
    async fn fill_donor_form(handle: &SessionHandle, answers: [&str; 7]) -> SessionView {
        select(handle, "Donate").await;
        wait_for_view(handle, |v| last_is(v, DialogueState::AskFirstName, script::DONATE_START))
            .await;

        for (field, answer) in DonorField::ALL.into_iter().zip(answers) {
            say(handle, answer).await;
            match (field.next(), prompt_after(field)) {
                (Some(next), Some(prompt)) => {
                    wait_for_view(handle, |v| last_is(v, next.step(), prompt)).await;
                }
                _ => {
                    wait_for_view(handle, |v| {
                        last_is(v, DialogueState::ConfirmInfo, script::CONFIRM_NO)
                    })
                    .await;
                }
            }
        }
        handle.view()
    }

    fn texts(view: &SessionView) -> Vec<&str> {
        view.transcript.iter().map(|e| e.message.text.as_str()).collect()
    }

    fn jane() -> DonorRecord {
        let mut record = DonorRecord::default();
        for (field, value) in DonorField::ALL.into_iter().zip(JANE) {
            record.set(field, value);
        }
        record
    }

    #[tokio::test]
    async fn test_mount_greets_with_menu() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        let view = handle.view();
        assert_eq!(
            texts(&view),
            vec![
                script::WELCOME,
                script::MENU_PROMPT,
                "Donate",
                "Volunteer",
                "Contact",
                "General Inquiries"
            ]
        );
        assert!(view.transcript[2..].iter().all(|e| e.message.is_selectable_option));
        assert!(!view.confirm_buttons_visible);
        assert!(view.donor.is_empty());
    }

    #[tokio::test]
    async fn test_full_donation_flow_produces_link() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        let view = fill_donor_form(&handle, JANE).await;
        assert_eq!(view.donor, jane());
        assert!(view.confirm_buttons_visible);
        assert!(texts(&view).contains(&jane().summary().as_str()));
        assert!(view
            .transcript
            .iter()
            .all(|e| !e.message.is_selectable_option));

        say(&handle, "Yes").await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Options, "General Inquiries")
        })
        .await;

        let links: Vec<&str> = view
            .transcript
            .iter()
            .filter(|e| e.message.is_hyperlink)
            .map(|e| e.message.text.as_str())
            .collect();
        assert_eq!(
            links,
            vec![
                "https://secure.winred.com/tom-emmer/emmer-for-congress?sc=winred-directory\
                 &money_bomb=false&recurring=false&first_name=Jane&last_name=Doe\
                 &email=jane%40x.com&address=1%20Main%20St&city=Springfield&state=IL&zip=62704"
            ]
        );
        assert_eq!(links[0], donation_link(&jane()));
        assert!(!view.confirm_buttons_visible);
        assert!(texts(&view).contains(&script::LINK_THANKS));
    }

    #[tokio::test]
    async fn test_link_pause_holds_provide_link() {
        let mock = Arc::new(MockCompletionService::new());
        let timing = SessionTiming {
            typing_delay: Duration::from_millis(1),
            link_pause: Duration::from_millis(300),
            ..SessionTiming::default()
        };
        let manager = manager_with(&mock, timing);
        let handle = open_at_menu(&manager).await;
        fill_donor_form(&handle, JANE).await;

        say(&handle, "yes").await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::ProvideLink, script::LINK_THANKS)
        })
        .await;
        assert!(view.transcript.iter().any(|e| e.message.is_hyperlink));

        wait_for_view(&handle, |v| last_is(v, DialogueState::Options, "General Inquiries")).await;
    }

    #[tokio::test]
    async fn test_rejecting_summary_restarts_donation() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;
        fill_donor_form(&handle, JANE).await;

        say(&handle, script::CONFIRM_NO).await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::AskFirstName, script::RESTART_DONATION)
        })
        .await;

        assert!(view.donor.is_empty());
        assert!(!view.confirm_buttons_visible);
        assert!(!view.transcript.iter().any(|e| e.message.is_hyperlink));
    }

    #[tokio::test]
    async fn test_volunteer_then_chat_uses_completion() {
        let mock = Arc::new(MockCompletionService::new());
        mock.queue_reply(vec!["Thanks", " for helping!"]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        say(&handle, "Volunteer").await;
        wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Chat, script::VOLUNTEER_INSTRUCTIONS)
        })
        .await;

        say(&handle, "I can knock doors").await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Chat, "Thanks for helping!")
        })
        .await;

        assert_eq!(mock.recorded_requests().len(), 1);
        let tail: Vec<&str> = texts(&view).into_iter().rev().take(3).collect();
        assert_eq!(
            tail,
            vec![
                "Thanks for helping!",
                "I can knock doors",
                script::VOLUNTEER_INSTRUCTIONS
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_option_reoffers_menu() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        say(&handle, "Pizza").await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Options, "General Inquiries")
                && v.transcript.iter().any(|e| e.message.text == script::UNKNOWN_OPTION)
        })
        .await;

        assert_eq!(
            texts(&view),
            vec![
                script::WELCOME,
                script::MENU_PROMPT,
                "Pizza",
                script::UNKNOWN_OPTION,
                script::MENU_PROMPT,
                "Donate",
                "Volunteer",
                "Contact",
                "General Inquiries"
            ]
        );
        assert!(view.donor.is_empty());
        assert!(mock.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_sends_preamble_and_history_once() {
        let mock = Arc::new(MockCompletionService::new());
        mock.queue_reply(vec!["Lower", " taxes."]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "General Inquiries").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, script::INQUIRY_INVITATION))
            .await;

        let mut events = handle.subscribe();
        say(&handle, "What is the platform?").await;
        let view =
            wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, "Lower taxes.")).await;

        let requests = mock.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages,
            vec![
                ChatMessage::system("PREAMBLE"),
                ChatMessage::assistant(script::WELCOME),
                ChatMessage::assistant(script::MENU_PROMPT),
                ChatMessage::assistant(script::INQUIRY_INVITATION),
                ChatMessage::user("What is the platform?"),
            ]
        );
        assert_eq!(
            requests[0]
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );

        let replies = view
            .transcript
            .iter()
            .filter(|e| e.message.text == "Lower taxes.")
            .count();
        assert_eq!(replies, 1);

        let mut deltas = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SseEvent::Delta { text } = event {
                deltas.push(text);
            }
        }
        assert_eq!(deltas, vec!["Lower".to_string(), " taxes.".to_string()]);
    }

    #[tokio::test]
    async fn test_completion_failure_keeps_chatting() {
        let mock = Arc::new(MockCompletionService::new());
        mock.queue_error(CompletionError::rate_limit("Too many requests"));
        mock.queue_reply(vec!["Back again"]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "General Inquiries").await;
        say(&handle, "hello?").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, script::COMPLETION_FAILED))
            .await;

        say(&handle, "hello again").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, "Back again")).await;
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_donor_data_never_reaches_completion() {
        let mock = Arc::new(MockCompletionService::new());
        mock.queue_reply(vec!["Happy to help."]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        fill_donor_form(&handle, JANE).await;
        say(&handle, "Yes").await;
        wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Options, "General Inquiries")
                && v.transcript.iter().any(|e| e.message.is_hyperlink)
        })
        .await;

        select(&handle, "General Inquiries").await;
        say(&handle, "When is the next rally?").await;
        let view =
            wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, "Happy to help.")).await;
        assert!(texts(&view).contains(&"jane@x.com"));

        let requests = mock.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages,
            vec![
                ChatMessage::system("PREAMBLE"),
                ChatMessage::assistant(script::WELCOME),
                ChatMessage::assistant(script::MENU_PROMPT),
                ChatMessage::assistant(script::MENU_PROMPT),
                ChatMessage::assistant(script::INQUIRY_INVITATION),
                ChatMessage::user("When is the next rally?"),
            ]
        );
        for message in &requests[0].messages {
            for value in JANE.iter().filter(|v| v.len() > 2) {
                assert!(!message.content.contains(value), "{value} was forwarded");
            }
            assert!(!message.content.contains("winred"));
            assert!(!message.content.contains("First Name:"));
        }
    }

    #[tokio::test]
    async fn test_empty_completion_counts_as_failure() {
        let mock = Arc::new(MockCompletionService::new());
        mock.queue_reply(vec![]);
        mock.queue_reply(vec!["Second try"]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "General Inquiries").await;
        say(&handle, "anyone there?").await;
        let view = wait_for_view(&handle, |v| {
            last_is(v, DialogueState::Chat, script::COMPLETION_FAILED)
        })
        .await;
        assert!(view.transcript.iter().all(|e| !e.message.text.is_empty()));

        say(&handle, "hello?").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, "Second try")).await;
        let requests = mock.recorded_requests();
        assert!(requests[1].messages.iter().all(|m| !m.content.is_empty()));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_reaped() {
        let mock = Arc::new(MockCompletionService::new());
        let timing = SessionTiming {
            idle_timeout: Duration::from_millis(50),
            ..fast_timing()
        };
        let manager = manager_with(&mock, timing);

        let mut handles = Vec::new();
        for _ in 0..50 {
            handles.push(manager.open().await);
        }
        let last = handles[49].clone();
        drop(handles);

        tokio::time::timeout(WAIT, async {
            while manager.len().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("idle sessions were not reaped");

        assert!(last.is_closed());
        assert_eq!(
            manager.get(&last.session_id).await.err(),
            Some(SessionError::NotFound(last.session_id.clone()))
        );
        assert_eq!(
            last.send(Event::UserInput { text: "hi".into() }).await,
            Err(SessionError::Closed)
        );
    }

    #[tokio::test]
    async fn test_activity_defers_idle_reaping() {
        let mock = Arc::new(MockCompletionService::new());
        let timing = SessionTiming {
            idle_timeout: Duration::from_millis(400),
            ..fast_timing()
        };
        let manager = manager_with(&mock, timing);
        let handle = open_at_menu(&manager).await;

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            say(&handle, "Pizza").await;
        }
        assert_eq!(manager.len().await, 1);
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_option_click_outside_menu_is_rejected() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "Donate").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::AskFirstName, script::DONATE_START))
            .await;

        let mut events = handle.subscribe();
        select(&handle, "Volunteer").await;
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for error event")
            .unwrap();
        assert!(matches!(event, SseEvent::Error { .. }));
        assert_eq!(handle.view().state, DialogueState::AskFirstName);
    }

    #[tokio::test]
    async fn test_close_and_reopen_starts_fresh() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "Donate").await;
        say(&handle, "Jane").await;
        wait_for_view(&handle, |v| v.state == DialogueState::AskLastName).await;

        manager.close(&handle.session_id).await.unwrap();
        assert!(handle.is_closed());
        assert_eq!(
            manager.get(&handle.session_id).await.err(),
            Some(SessionError::NotFound(handle.session_id.clone()))
        );
        assert_eq!(
            handle.send(Event::UserInput { text: "Doe".into() }).await,
            Err(SessionError::Closed)
        );

        let reopened = open_at_menu(&manager).await;
        assert_ne!(reopened.session_id, handle.session_id);
        let view = reopened.view();
        assert_eq!(view.last_text(), Some("General Inquiries"));
        assert_eq!(view.transcript[0].message.text, script::WELCOME);
        assert!(view.donor.is_empty());
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_closing_drops_pending_messages() {
        let mock = Arc::new(MockCompletionService::new());
        let timing = SessionTiming {
            typing_delay: Duration::from_millis(200),
            link_pause: Duration::from_millis(30),
            ..SessionTiming::default()
        };
        let manager = manager_with(&mock, timing);
        let handle = manager.open().await;
        manager.close(&handle.session_id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.view().transcript.is_empty());
    }

    #[tokio::test]
    async fn test_closing_abandons_inflight_completion() {
        let mock = Arc::new(
            MockCompletionService::new().with_chunk_delay(Duration::from_millis(200)),
        );
        mock.queue_reply(vec!["never", " shown"]);
        let manager = manager_with(&mock, fast_timing());
        let handle = open_at_menu(&manager).await;

        select(&handle, "General Inquiries").await;
        say(&handle, "question").await;
        wait_for_view(&handle, |v| last_is(v, DialogueState::Chat, "question")).await;
        manager.close(&handle.session_id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.view().last_text(), Some("question"));
    }

    #[tokio::test]
    async fn test_unknown_session_lookups_fail() {
        let mock = Arc::new(MockCompletionService::new());
        let manager = manager_with(&mock, fast_timing());
        assert_eq!(
            manager.get("missing").await.err(),
            Some(SessionError::NotFound("missing".into()))
        );
        assert_eq!(
            manager.close("missing").await,
            Err(SessionError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn test_mock_completion_service() {
        let mock = MockCompletionService::new();
        mock.queue_reply(vec!["a", "b"]);
        let request = CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
        };

        let parts: Vec<_> = mock.stream(&request).await.unwrap().collect().await;
        assert_eq!(parts.len(), 2);

        // Nothing left in the queue
        assert!(mock.stream(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }
}
