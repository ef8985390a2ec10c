/// Who a transcript entry came from. Backend roles other than "user" all
/// collapse to `Bot` at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// One rendered message. An animated entry owns its own character cursor;
/// `revealed` is `Some(n)` while the typewriter is mid-flight and `None`
/// once the full text is visible.
#[derive(Debug, Clone)]
pub struct Entry {
    pub sender: Sender,
    text: String,
    revealed: Option<usize>,
}

impl Entry {
    /// The portion of the text the typewriter has revealed so far.
    pub fn visible_text(&self) -> &str {
        match self.revealed {
            Some(chars) => {
                let byte_end = self
                    .text
                    .char_indices()
                    .nth(chars)
                    .map(|(i, _)| i)
                    .unwrap_or(self.text.len());
                &self.text[..byte_end]
            }
            None => &self.text,
        }
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }

    pub fn is_typing(&self) -> bool {
        self.revealed.is_some()
    }
}

/// Ordered transcript of the currently selected session.
///
/// Always a projection of either freshly-sent messages or a fetched history;
/// switching sessions clears and rebuilds it. Clearing also cancels every
/// in-flight typewriter, since the cursors live inside the entries.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    notice: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message. With `animate` the text is revealed one character
    /// per tick; otherwise it shows immediately.
    pub fn push(&mut self, sender: Sender, text: impl Into<String>, animate: bool) {
        self.entries.push(Entry {
            sender,
            text: text.into(),
            revealed: animate.then_some(0),
        });
    }

    /// Removes all entries and any notice. Outstanding animations stop here.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.notice = None;
    }

    /// Placeholder line for an empty fetched history.
    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.notice.is_none()
    }

    /// Advances every animating entry by one character. Returns whether any
    /// cursor moved, so the caller knows a redraw is worthwhile.
    pub fn tick(&mut self) -> bool {
        let mut advanced = false;
        for entry in &mut self.entries {
            if let Some(cursor) = entry.revealed {
                let total = entry.text.chars().count();
                let next = cursor + 1;
                entry.revealed = if next >= total { None } else { Some(next) };
                advanced = true;
            }
        }
        advanced
    }

    /// Display height of the transcript at `width` columns, counting the
    /// label line, wrapped visible content, and the blank line after each
    /// entry. Character counts, not bytes, to match the renderer's wrap.
    pub fn wrapped_line_count(&self, width: u16) -> u16 {
        let wrap_width = if width > 0 { width as usize } else { 50 };
        let mut total: u16 = 0;

        if self.notice.is_some() {
            total += 2; // notice line + blank
        }

        for entry in &self.entries {
            total += 1; // sender label
            for line in entry.visible_text().lines() {
                let char_count = line.chars().count();
                if char_count == 0 {
                    total += 1;
                } else {
                    total += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total += 1; // blank line between messages
        }

        total
    }
}
