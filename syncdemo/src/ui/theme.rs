//! Colors and text styles shared by the panels.

use ratatui::style::{Color, Modifier, Style};

/// Plain transcript text.
pub const TEXT: Style = Style::new().fg(Color::White);

/// Help text and tree metadata.
pub const DIM: Style = Style::new().fg(Color::Gray);

/// Digest root and the application name.
pub const STRONG: Style = Style::new().fg(Color::White).add_modifier(Modifier::BOLD);

/// Timestamps in front of each transcript line.
pub const TIMESTAMP: Style = Style::new().fg(Color::Rgb(120, 120, 120));

/// Notices from the controller (room changes, fetch problems).
pub const NOTICE: Style = Style::new()
    .fg(Color::Rgb(100, 140, 180))
    .add_modifier(Modifier::ITALIC);

/// The line being typed.
pub const INPUT: Style = Style::new().fg(Color::White).add_modifier(Modifier::BOLD);

/// Bottom status line.
pub const STATUS_BAR: Style = Style::new().fg(Color::White).bg(Color::Rgb(30, 30, 50));

/// Tree node under the selection cursor.
pub const SELECTED_NODE: Style = Style::new()
    .fg(Color::Black)
    .bg(Color::Cyan)
    .add_modifier(Modifier::BOLD);

/// Transcript panel title.
pub const CHAT_TITLE: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);

/// Digest tree panel title.
pub const TREE_TITLE: Style = Style::new().fg(Color::Green).add_modifier(Modifier::BOLD);

const FOCUSED_BORDER: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);

/// Palette cycled through for nick labels.
const NICK_PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::LightBlue,
    Color::LightRed,
    Color::Rgb(255, 165, 0),
    Color::Rgb(180, 120, 255),
];

/// Border style for a panel.
#[must_use]
pub const fn border(focused: bool) -> Style {
    if focused { FOCUSED_BORDER } else { TEXT }
}

/// Marker color for a tree node: green while the prefix is in the group.
#[must_use]
pub const fn presence(present: bool) -> Color {
    if present { Color::Green } else { Color::DarkGray }
}

/// Stable color for a nick, so a peer looks the same in the transcript and
/// the tree.
#[must_use]
pub fn nick(name: &str) -> Style {
    let hash = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    Style::new()
        .fg(NICK_PALETTE[hash as usize % NICK_PALETTE.len()])
        .add_modifier(Modifier::BOLD)
}
