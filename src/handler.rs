use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::SessionsLoaded(result) => app.on_sessions_loaded(result),
        AppEvent::HistoryLoaded { generation, result } => {
            app.on_history_loaded(generation, result)
        }
        AppEvent::ReplyReceived(result) => app.on_reply(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Focus cycling
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sessions => {
                    app.input_mode = InputMode::Editing;
                    FocusPane::Input
                }
                FocusPane::Input => FocusPane::Transcript,
                FocusPane::Transcript => FocusPane::Sessions,
            };
        }

        // Jump straight into the input line
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        // Navigation / scrolling
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sessions => app.session_nav_down(),
            _ => app.scroll_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sessions => app.session_nav_up(),
            _ => app.scroll_up(),
        },
        KeyCode::Char('g') => {
            if app.focus != FocusPane::Sessions {
                app.follow = false;
                app.chat_scroll = 0;
            }
        }
        KeyCode::Char('G') => {
            if app.focus != FocusPane::Sessions {
                app.follow = true;
                app.scroll_chat_to_bottom();
            }
        }

        // Open the highlighted past conversation
        KeyCode::Enter => match app.focus {
            FocusPane::Sessions => app.open_highlighted_session(),
            FocusPane::Input => app.input_mode = InputMode::Editing,
            FocusPane::Transcript => {}
        },

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Transcript;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_sessions = app.sessions_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_sessions {
                app.session_nav_down();
            } else if in_chat {
                app.scroll_down();
                app.scroll_down();
                app.scroll_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_sessions {
                app.session_nav_up();
            } else if in_chat {
                app.scroll_up();
                app.scroll_up();
                app.scroll_up();
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if in_sessions {
                if let Some(area) = app.sessions_area {
                    // First row inside the border is the first visible item
                    let row = y.saturating_sub(area.y + 1) as usize;
                    let index = app.session_state.offset() + row;
                    if index < app.sessions.len() {
                        app.select_session(index);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatApi;
    use crate::session::SessionStore;
    use crossterm::event::KeyEventState;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn test_app() -> (App, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"));
        let api = ChatApi::new("http://127.0.0.1:9");
        // Receiver is dropped; sends from spawned tasks are ignored.
        let (tx, _rx) = mpsc::unbounded_channel();
        (App::new(api, store, tx), dir)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[tokio::test]
    async fn test_typing_edits_at_the_cursor() {
        let (mut app, _dir) = test_app();
        for c in "hело".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.input, "hео");
        assert_eq!(app.input_cursor, 2);
    }

    #[tokio::test]
    async fn test_enter_in_editing_mode_submits() {
        let (mut app, _dir) = test_app();
        for c in "hi".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Enter));

        assert_eq!(app.transcript.entries().len(), 1);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_editing_mode() {
        let (mut app, _dir) = test_app();
        let key = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        handle_key(&mut app, key);
        assert!(app.should_quit);
    }
}
