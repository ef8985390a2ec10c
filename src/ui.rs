use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, FocusPane, InputMode, Phase};
use crate::transcript::Sender;

/// Display label for a session preview: the first 30 characters plus an
/// ellipsis. The ellipsis is always appended, matching the backend's own
/// preview formatting.
pub fn preview_label(preview: &str) -> String {
    let truncated: String = preview.chars().take(30).collect();
    format!("{}...", truncated)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);

    let [sessions_area, chat_column] =
        Layout::horizontal([Constraint::Length(32), Constraint::Min(0)]).areas(body_area);

    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(chat_column);

    // Store areas for mouse hit-testing
    app.sessions_area = Some(sessions_area);
    app.chat_area = Some(chat_area);

    // Inner size minus borders, used by the scroll arithmetic
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    if app.follow {
        app.scroll_chat_to_bottom();
    }

    render_sessions(app, frame, sessions_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" WikiGPT ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sessions(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sessions;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Past Chats ");

    if app.sessions.is_empty() {
        let placeholder = match (&app.session_notice, app.phase) {
            (Some(notice), _) => notice.as_str(),
            (None, Phase::LoadingSessions) => "Loading...",
            (None, _) => "",
        };
        let text = Paragraph::new(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ))
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app
        .sessions
        .iter()
        .map(|session| ListItem::new(format!(" {} ", preview_label(&session.preview))))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.session_state);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let text = if app.transcript.is_empty() && app.pending_sends == 0 {
        Text::from(Span::styled(
            "Ask WikiGPT anything...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        if let Some(notice) = app.transcript.notice() {
            lines.push(Line::from(Span::styled(
                notice.to_string(),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::default());
        }

        for entry in app.transcript.entries() {
            match entry.sender {
                Sender::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                }
                Sender::Bot => {
                    lines.push(Line::from(Span::styled(
                        "WikiGPT:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                }
            }
            for line in entry.visible_text().lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }

        if app.pending_sends > 0 {
            lines.push(Line::from(Span::styled(
                "WikiGPT:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.spinner_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let transcript = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(transcript, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message (Enter to send) ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode = match app.input_mode {
        InputMode::Editing => Span::styled(
            " INSERT ",
            Style::default().bg(Color::Yellow).fg(Color::Black).bold(),
        ),
        InputMode::Normal => Span::styled(
            " NORMAL ",
            Style::default().bg(Color::DarkGray).fg(Color::White).bold(),
        ),
    };

    let hints = match app.focus {
        FocusPane::Sessions => " j/k select  Enter load  Tab focus  q quit",
        FocusPane::Transcript => " j/k scroll  g/G top/bottom  Tab focus  q quit",
        FocusPane::Input => " Enter send  Esc normal  Tab focus",
    };

    let status = match app.phase {
        Phase::LoadingSessions => "loading sessions",
        Phase::LoadingHistory => "loading history",
        _ => "",
    };

    let line = Line::from(vec![
        mode,
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled(status, Style::default().fg(Color::DarkGray).italic()),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}
