use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::{ApiError, ChatApi, HistoryMessage, SessionSummary};
use crate::session::SessionStore;
use crate::transcript::{Sender, Transcript};
use crate::tui::AppEvent;

pub const EMPTY_HISTORY_NOTICE: &str = "No previous messages found.";
pub const EMPTY_SESSIONS_NOTICE: &str = "No chat history available.";
pub const UNEXPECTED_FORMAT_REPLY: &str = "Unexpected response format.";
pub const SERVER_UNREACHABLE_REPLY: &str = "⚠️ Error: Unable to reach server.";

// Spinner frame advances every 6th tick (300 ms at the 50 ms tick).
const SPINNER_TICKS: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingSessions,
    LoadingHistory,
    HistoryLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sessions,
    Transcript,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Chat controller: the sole mutator of session identity and the sole
/// caller of the transcript and the backend client. Backend calls run in
/// spawned tasks; their outcomes come back through the event channel, so
/// nothing here ever blocks input or rendering.
pub struct App {
    // Core state
    pub should_quit: bool,
    pub phase: Phase,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    // Session list pane
    pub sessions: Vec<SessionSummary>,
    pub session_state: ListState,
    pub session_notice: Option<String>,

    // Transcript pane
    pub transcript: Transcript,
    pub chat_scroll: u16,
    pub follow: bool,
    pub chat_height: u16,
    pub chat_width: u16,

    // Input state
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // In-flight sends; overlapping sends are counted, never coalesced
    pub pending_sends: usize,
    pub spinner_frame: u8,
    spinner_ticks: u8,

    // Each session switch bumps this; a history response carrying an older
    // value lost the race and is dropped.
    history_gen: u64,

    // Panel areas for mouse hit-testing (updated during render)
    pub sessions_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    store: SessionStore,
    api: ChatApi,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(api: ChatApi, mut store: SessionStore, events: UnboundedSender<AppEvent>) -> Self {
        // Make sure a session id exists from the first frame, like the
        // browser client does on load.
        store.get_or_create();

        Self {
            should_quit: false,
            phase: Phase::Idle,
            focus: FocusPane::Input,
            input_mode: InputMode::Editing,

            sessions: Vec::new(),
            session_state: ListState::default(),
            session_notice: None,

            transcript: Transcript::new(),
            chat_scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,

            input: String::new(),
            input_cursor: 0,

            pending_sends: 0,
            spinner_frame: 0,
            spinner_ticks: 0,

            history_gen: 0,

            sessions_area: None,
            chat_area: None,

            store,
            api,
            events,
        }
    }

    pub fn current_session_id(&mut self) -> String {
        self.store.get_or_create()
    }

    /// Startup: fetch the list of known sessions in the background.
    pub fn start(&mut self) {
        self.phase = Phase::LoadingSessions;

        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.fetch_sessions().await;
            let _ = events.send(AppEvent::SessionsLoaded(result));
        });
    }

    pub fn on_sessions_loaded(&mut self, result: Result<Vec<SessionSummary>, ApiError>) {
        match result {
            Ok(sessions) if sessions.is_empty() => {
                self.session_notice = Some(EMPTY_SESSIONS_NOTICE.to_string());
                self.phase = Phase::Idle;
            }
            Ok(sessions) => {
                self.sessions = sessions;
                self.session_notice = None;
                // The backend lists oldest first; auto-load the most recent.
                self.select_session(self.sessions.len() - 1);
            }
            Err(e) => {
                tracing::warn!("failed to load session list: {}", e);
                self.phase = Phase::Idle;
            }
        }
    }

    /// Switches the current session and fetches its history. Clears the
    /// transcript up front so stale messages never sit under a load.
    pub fn select_session(&mut self, index: usize) {
        let Some(summary) = self.sessions.get(index) else {
            return;
        };
        let id = summary.id.clone();

        self.session_state.select(Some(index));
        self.store.set(&id);
        self.transcript.clear();
        self.chat_scroll = 0;
        self.follow = true;
        self.phase = Phase::LoadingHistory;

        self.history_gen += 1;
        let generation = self.history_gen;
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.fetch_history(&id).await;
            let _ = events.send(AppEvent::HistoryLoaded { generation, result });
        });
    }

    pub fn on_history_loaded(
        &mut self,
        generation: u64,
        result: Result<Vec<HistoryMessage>, ApiError>,
    ) {
        if generation != self.history_gen {
            tracing::debug!("discarding history response for a superseded session switch");
            return;
        }

        match result {
            Ok(messages) if messages.is_empty() => {
                self.transcript.clear();
                self.transcript.set_notice(EMPTY_HISTORY_NOTICE);
            }
            Ok(messages) => {
                self.transcript.clear();
                for msg in messages {
                    // Re-displaying history must not re-trigger the typewriter
                    self.transcript.push(sender_for_role(&msg.role), msg.content, false);
                }
                self.follow = true;
                self.scroll_chat_to_bottom();
            }
            Err(e) => {
                // Transcript left as-is; the user can still retry by
                // clicking the entry again or sending a message.
                tracing::warn!("failed to load chat history: {}", e);
            }
        }
        self.phase = Phase::HistoryLoaded;
    }

    /// Sends the input line. Empty or whitespace-only input is a no-op.
    /// The user's message is rendered before the request is issued.
    pub fn submit_input(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.transcript.push(Sender::User, text.clone(), false);
        self.input.clear();
        self.input_cursor = 0;
        self.follow = true;
        self.scroll_chat_to_bottom();

        self.pending_sends += 1;
        let id = self.current_session_id();
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.send_message(&id, &text).await;
            let _ = events.send(AppEvent::ReplyReceived(result));
        });
    }

    pub fn on_reply(&mut self, result: Result<String, ApiError>) {
        self.pending_sends = self.pending_sends.saturating_sub(1);

        match result {
            Ok(text) => {
                self.transcript.push(Sender::Bot, text, true);
            }
            Err(ApiError::MissingField(field)) => {
                tracing::warn!("chat response lacked the `{}` field", field);
                self.transcript.push(Sender::Bot, UNEXPECTED_FORMAT_REPLY, true);
            }
            Err(e) => {
                tracing::warn!("failed to send message: {}", e);
                self.transcript.push(Sender::Bot, SERVER_UNREACHABLE_REPLY, false);
            }
        }

        self.follow = true;
        self.scroll_chat_to_bottom();
    }

    /// Tick: advance the typewriter cursors and the thinking spinner.
    pub fn tick(&mut self) {
        let typed = self.transcript.tick();

        if self.pending_sends > 0 {
            self.spinner_ticks = (self.spinner_ticks + 1) % SPINNER_TICKS;
            if self.spinner_ticks == 0 {
                self.spinner_frame = (self.spinner_frame + 1) % 3;
            }
        }

        if typed && self.follow {
            self.scroll_chat_to_bottom();
        }
    }

    // Session list navigation
    pub fn session_nav_down(&mut self) {
        let len = self.sessions.len();
        if len > 0 {
            let i = self.session_state.selected().unwrap_or(0);
            self.session_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn session_nav_up(&mut self) {
        let i = self.session_state.selected().unwrap_or(0);
        self.session_state.select(Some(i.saturating_sub(1)));
    }

    /// Loads the history of the highlighted session list entry.
    pub fn open_highlighted_session(&mut self) {
        if let Some(i) = self.session_state.selected() {
            self.select_session(i);
        }
    }

    // Transcript scrolling. Scrolling away from the bottom disables
    // follow mode; reaching the bottom re-enables it.
    pub fn scroll_up(&mut self) {
        self.follow = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(1).min(max);
        if self.chat_scroll >= max {
            self.follow = true;
        }
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
    }

    fn max_chat_scroll(&self) -> u16 {
        let width = if self.chat_width > 0 { self.chat_width } else { 50 };
        let mut total_lines = self.transcript.wrapped_line_count(width);
        if self.pending_sends > 0 {
            total_lines += 2; // "WikiGPT:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        total_lines.saturating_sub(visible_height)
    }
}

fn sender_for_role(role: &str) -> Sender {
    if role == "user" {
        Sender::User
    } else {
        Sender::Bot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn summaries(ids: &[&str]) -> Vec<SessionSummary> {
        ids.iter()
            .map(|id| SessionSummary {
                id: id.to_string(),
                preview: format!("preview of {}", id),
            })
            .collect()
    }

    fn history(messages: &[(&str, &str)]) -> Vec<HistoryMessage> {
        messages
            .iter()
            .map(|(role, content)| HistoryMessage {
                role: role.to_string(),
                content: content.to_string(),
            })
            .collect()
    }

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"));
        // Nothing listens here; spawned calls fail long after assertions run
        let api = ChatApi::new("http://127.0.0.1:9");
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(api, store, tx), rx, dir)
    }

    #[tokio::test]
    async fn test_startup_selects_most_recent_session() {
        let (mut app, _rx, _dir) = test_app();
        app.start();
        assert_eq!(app.phase, Phase::LoadingSessions);

        app.on_sessions_loaded(Ok(summaries(&["s1", "s2"])));

        assert_eq!(app.sessions.len(), 2);
        assert_eq!(app.session_state.selected(), Some(1));
        assert_eq!(app.current_session_id(), "s2");
        assert_eq!(app.phase, Phase::LoadingHistory);
    }

    #[tokio::test]
    async fn test_empty_session_list_shows_notice() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(Vec::new()));

        assert_eq!(app.session_notice.as_deref(), Some(EMPTY_SESSIONS_NOTICE));
        assert_eq!(app.phase, Phase::Idle);
        assert!(app.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_session_list_leaves_ui_idle() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)));

        assert!(app.sessions.is_empty());
        assert!(app.session_notice.is_none());
        assert_eq!(app.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_history_renders_in_order_without_animation() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(summaries(&["s1"])));
        let generation = app.history_gen;

        app.on_history_loaded(generation, Ok(history(&[("user", "hi"), ("assistant", "hello")])));

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender, Sender::User);
        assert_eq!(entries[0].visible_text(), "hi");
        assert_eq!(entries[1].sender, Sender::Bot);
        assert_eq!(entries[1].visible_text(), "hello");
        assert!(!entries[1].is_typing());
        assert_eq!(app.phase, Phase::HistoryLoaded);
    }

    #[tokio::test]
    async fn test_empty_history_shows_notice() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(summaries(&["s1"])));
        let generation = app.history_gen;

        app.on_history_loaded(generation, Ok(Vec::new()));

        assert!(app.transcript.entries().is_empty());
        assert_eq!(app.transcript.notice(), Some(EMPTY_HISTORY_NOTICE));
    }

    #[tokio::test]
    async fn test_stale_history_response_is_discarded() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(summaries(&["s1", "s2"])));
        let stale = app.history_gen;

        app.select_session(0);
        app.on_history_loaded(stale, Ok(history(&[("user", "stale message")])));
        assert!(app.transcript.entries().is_empty());

        app.on_history_loaded(app.history_gen, Ok(history(&[("user", "fresh")])));
        assert_eq!(app.transcript.entries().len(), 1);
        assert_eq!(app.transcript.entries()[0].visible_text(), "fresh");
    }

    #[tokio::test]
    async fn test_submit_renders_user_message_before_reply() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "  what is rust?  ".to_string();
        app.submit_input();

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender, Sender::User);
        assert_eq!(entries[0].visible_text(), "what is rust?");
        assert!(app.input.is_empty());
        assert_eq!(app.pending_sends, 1);
    }

    #[tokio::test]
    async fn test_whitespace_input_is_a_noop() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "   \t ".to_string();
        app.submit_input();

        assert!(app.transcript.is_empty());
        assert_eq!(app.pending_sends, 0);
    }

    #[tokio::test]
    async fn test_reply_is_typed_out_character_by_character() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "question".to_string();
        app.submit_input();
        app.on_reply(Ok("42".to_string()));

        let bot = &app.transcript.entries()[1];
        assert_eq!(bot.sender, Sender::Bot);
        assert_eq!(bot.visible_text(), "");
        assert!(bot.is_typing());

        app.tick();
        assert_eq!(app.transcript.entries()[1].visible_text(), "4");
        app.tick();
        assert_eq!(app.transcript.entries()[1].visible_text(), "42");
        assert!(!app.transcript.entries()[1].is_typing());
        assert_eq!(app.pending_sends, 0);
    }

    #[tokio::test]
    async fn test_missing_field_reply_uses_fixed_fallback() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "question".to_string();
        app.submit_input();
        app.on_reply(Err(ApiError::MissingField("response")));

        let bot = &app.transcript.entries()[1];
        assert_eq!(bot.full_text(), UNEXPECTED_FORMAT_REPLY);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_user_message_and_warns() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "question".to_string();
        app.submit_input();
        app.on_reply(Err(ApiError::Timeout));

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].visible_text(), "question");
        assert_eq!(entries[1].sender, Sender::Bot);
        assert_eq!(entries[1].visible_text(), SERVER_UNREACHABLE_REPLY);
        assert_eq!(app.pending_sends, 0);
    }

    #[tokio::test]
    async fn test_overlapping_sends_are_counted_not_coalesced() {
        let (mut app, _rx, _dir) = test_app();
        app.input = "first".to_string();
        app.submit_input();
        app.input = "second".to_string();
        app.submit_input();
        assert_eq!(app.pending_sends, 2);

        app.on_reply(Ok("reply a".to_string()));
        app.on_reply(Ok("reply b".to_string()));
        assert_eq!(app.pending_sends, 0);
        assert_eq!(app.transcript.entries().len(), 4);
    }

    #[tokio::test]
    async fn test_selecting_session_persists_the_id() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(summaries(&["s1", "s2"])));
        app.select_session(0);

        assert_eq!(app.current_session_id(), "s1");
        assert!(app.transcript.is_empty());
        assert_eq!(app.phase, Phase::LoadingHistory);
    }

    #[tokio::test]
    async fn test_failed_history_leaves_transcript_alone() {
        let (mut app, _rx, _dir) = test_app();
        app.on_sessions_loaded(Ok(summaries(&["s1"])));
        let generation = app.history_gen;
        app.on_history_loaded(generation, Ok(history(&[("user", "kept")])));

        app.select_session(0);
        // select cleared the transcript; the failure must not touch it
        app.on_history_loaded(app.history_gen, Err(ApiError::Timeout));
        assert!(app.transcript.entries().is_empty());
        assert!(app.transcript.notice().is_none());
    }
}
