//! Application state and event handling.
//!
//! [`App`] is the UI-side model: it owns the input line, the transcript and
//! the digest tree nodes, and it is only ever updated from the main loop by
//! applying [`ViewEvent`]s drained from the controller task.

use chrono::{Local, TimeZone};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use syncdemo_proto::message::Timestamp;

use crate::config::Settings;
use crate::controller::ViewEvent;
use crate::net::NetCommand;
use crate::peers::PeerEntry;
use crate::sync::SeqNo;

/// Which panel is currently focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Input box is focused (default).
    Input,
    /// Transcript is focused.
    Chat,
    /// Digest tree is focused.
    Tree,
}

/// Where a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A chat message (local echo or fetched).
    Chat,
    /// A notice generated by the client.
    System,
}

/// A line in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Sender nick, empty for system notices.
    pub sender: String,
    /// Message text.
    pub content: String,
    /// Formatted timestamp (e.g., "14:23").
    pub timestamp: String,
    /// Chat or system line.
    pub kind: MessageKind,
}

/// One node of the digest tree: a publishing prefix in the room, mirroring
/// the controller's peer table entry for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Publishing prefix.
    pub prefix: String,
    /// Last sequence number seen for the prefix.
    pub sequence: Option<SeqNo>,
    /// Nick last seen on a message from the prefix.
    pub label: Option<String>,
    /// Whether the prefix is still in the group.
    pub present: bool,
}

impl TreeNode {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            sequence: None,
            label: None,
            present: true,
        }
    }
}

/// Main application state.
#[derive(Debug)]
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Transcript of the current session.
    pub messages: Vec<DisplayMessage>,
    /// Which panel is focused.
    pub focus: PanelFocus,
    /// Scroll offset for message list.
    pub message_scroll: usize,
    /// Digest tree nodes, sorted by prefix.
    pub tree: Vec<TreeNode>,
    /// Selected tree node.
    pub selected_node: usize,
    /// Root digest last reported.
    pub digest: Option<String>,
    /// Topic of the current binding.
    pub topic: Option<String>,
    /// Session of the current binding.
    pub session: Option<u64>,
    /// Nick, chatroom and prefix as last reported.
    pub settings: Settings,
    /// Number of refit requests received.
    pub refits: usize,
    /// Whether the app should quit.
    pub should_quit: bool,
    timestamp_format: String,
}

impl App {
    /// Create an empty application.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            messages: Vec::new(),
            focus: PanelFocus::Input,
            message_scroll: 0,
            tree: Vec::new(),
            selected_node: 0,
            digest: None,
            topic: None,
            session: None,
            settings: Settings::default(),
            refits: 0,
            should_quit: false,
            timestamp_format: "%H:%M".to_string(),
        }
    }

    /// Use `format` (chrono syntax) for transcript timestamps.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Start from the settings the controller was created with.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Apply one notification from the controller.
    pub fn apply(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::Message(message) => {
                let timestamp = self.format_timestamp(message.timestamp);
                self.push(DisplayMessage {
                    sender: message.from,
                    content: message.data,
                    timestamp,
                    kind: MessageKind::Chat,
                });
            }
            ViewEvent::TreeUpdated { digest, .. } => self.digest = Some(digest),
            ViewEvent::PeerUpdated { prefix, entry } => {
                let PeerEntry { sequence, label } = entry;
                let node = self.node_mut(&prefix);
                node.sequence = sequence;
                node.label = label;
                node.present = true;
            }
            ViewEvent::SettingsChanged(settings) => self.settings = settings,
            ViewEvent::PeerRemoved { prefix } => {
                let node = self.node_mut(&prefix);
                node.present = false;
                let who = node.label.clone().unwrap_or(prefix);
                self.push_system_message(format!("{who} left the room"));
            }
            ViewEvent::PeerUnreachable { name, reason } => {
                self.push_system_message(format!("Could not fetch {name}: {reason}"));
            }
            ViewEvent::IntegrityError { name, detail } => {
                self.push_system_message(format!("Dropped malformed data {name}: {detail}"));
            }
            ViewEvent::FetchSkipped { total } => {
                self.push_system_message(format!("{total} missing messages not fetched"));
            }
            ViewEvent::Error(text) => self.push_system_message(text),
            ViewEvent::Refit => {
                self.refits += 1;
                self.selected_node = self.selected_node.min(self.tree.len().saturating_sub(1));
            }
            ViewEvent::Reset => {
                self.tree.clear();
                self.selected_node = 0;
                self.digest = None;
            }
            ViewEvent::Bound { topic, session } => {
                self.push_system_message(format!("Joined {topic}"));
                self.topic = Some(topic);
                self.session = Some(session);
            }
        }
    }

    /// Append a client notice to the transcript.
    pub fn push_system_message(&mut self, content: String) {
        let timestamp = self.format_timestamp(Timestamp::now());
        self.push(DisplayMessage {
            sender: String::new(),
            content,
            timestamp,
            kind: MessageKind::System,
        });
    }

    /// Handle a key event.
    ///
    /// Returns a command when the key completes an action the controller has
    /// to carry out.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<NetCommand> {
        // Global shortcuts
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
                return None;
            }
            (KeyCode::Tab, KeyModifiers::SHIFT) | (KeyCode::BackTab, _) => {
                self.cycle_focus_backward();
                return None;
            }
            (KeyCode::Tab, _) => {
                self.cycle_focus_forward();
                return None;
            }
            _ => {}
        }

        match self.focus {
            PanelFocus::Input => self.handle_input_key(key),
            PanelFocus::Chat => {
                self.handle_chat_key(key);
                None
            }
            PanelFocus::Tree => {
                self.handle_tree_key(key);
                None
            }
        }
    }

    /// Handle key event when input is focused.
    fn handle_input_key(&mut self, key: KeyEvent) -> Option<NetCommand> {
        match key.code {
            KeyCode::Enter => return self.submit_input(),
            KeyCode::Char(c) => self.enter_char(c),
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.cursor_position = 0,
            KeyCode::End => self.cursor_position = self.input.chars().count(),
            _ => {}
        }
        None
    }

    const fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(),
            _ => {}
        }
    }

    const fn handle_tree_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_node = self.selected_node.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_node + 1 < self.tree.len() {
                    self.selected_node += 1;
                }
            }
            _ => {}
        }
    }

    /// Cycle focus forward: Input -> Chat -> Tree -> Input.
    const fn cycle_focus_forward(&mut self) {
        self.focus = match self.focus {
            PanelFocus::Input => PanelFocus::Chat,
            PanelFocus::Chat => PanelFocus::Tree,
            PanelFocus::Tree => PanelFocus::Input,
        };
    }

    /// Cycle focus backward: Input -> Tree -> Chat -> Input.
    const fn cycle_focus_backward(&mut self) {
        self.focus = match self.focus {
            PanelFocus::Input => PanelFocus::Tree,
            PanelFocus::Tree => PanelFocus::Chat,
            PanelFocus::Chat => PanelFocus::Input,
        };
    }

    /// Submit the current input line.
    fn submit_input(&mut self) -> Option<NetCommand> {
        let line = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.parse_line(line)
    }

    /// Turn an input line into a command. Lines starting with `/` are
    /// client commands; anything else is published as chat text.
    fn parse_line(&mut self, line: &str) -> Option<NetCommand> {
        let Some(command) = line.strip_prefix('/') else {
            return Some(NetCommand::Publish {
                text: line.to_string(),
            });
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));

        let settings = match (name, arg) {
            ("quit" | "q", _) => {
                self.should_quit = true;
                return None;
            }
            (_, "") if matches!(name, "nick" | "room" | "prefix") => {
                self.push_system_message(format!("Usage: /{name} <value>"));
                return None;
            }
            ("nick", nick) => Settings::new(nick.to_string(), None::<String>, None::<String>),
            ("room", room) => Settings::new(None::<String>, room.to_string(), None::<String>),
            ("prefix", prefix) => {
                Settings::new(None::<String>, None::<String>, prefix.to_string())
            }
            _ => {
                self.push_system_message(format!(
                    "Unknown command /{name} (try /nick, /room, /prefix, /quit)"
                ));
                return None;
            }
        };
        Some(NetCommand::UpdateSettings(settings))
    }

    /// Insert a character at the cursor position.
    fn enter_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    const fn move_cursor_left(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    const fn scroll_up(&mut self) {
        if self.message_scroll > 0 {
            self.message_scroll -= 1;
        }
    }

    const fn scroll_down(&mut self) {
        if self.message_scroll < self.messages.len().saturating_sub(1) {
            self.message_scroll += 1;
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn push(&mut self, message: DisplayMessage) {
        self.messages.push(message);
        // Auto-scroll to bottom
        self.message_scroll = self.messages.len().saturating_sub(1);
    }

    fn node_mut(&mut self, prefix: &str) -> &mut TreeNode {
        let idx = match self.tree.binary_search_by(|n| n.prefix.as_str().cmp(prefix)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.tree.insert(idx, TreeNode::new(prefix));
                idx
            }
        };
        &mut self.tree[idx]
    }

    fn format_timestamp(&self, ts: Timestamp) -> String {
        let secs = i64::try_from(ts.as_secs()).unwrap_or(i64::MAX);
        match Local.timestamp_opt(secs, 0) {
            chrono::LocalResult::Single(dt) => dt.format(&self.timestamp_format).to_string(),
            _ => "??:??".to_string(),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
