//! Digest tree rendering: one node per publishing prefix in the room.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};

use super::theme;
use crate::app::{App, PanelFocus};

/// Number of digest characters shown at the root of the tree.
const DIGEST_CHARS: usize = 12;

/// Render the digest tree.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.focus == PanelFocus::Tree;

    let root = app.digest.as_deref().map_or_else(
        || "(no digest)".to_string(),
        |d| d.chars().take(DIGEST_CHARS).collect(),
    );
    let mut items = vec![ListItem::new(Line::from(Span::styled(root, theme::STRONG)))];

    items.extend(app.tree.iter().enumerate().map(|(idx, node)| {
        let is_last = idx + 1 == app.tree.len();
        let branch = if is_last { "└─ " } else { "├─ " };

        let mut spans = vec![
            Span::styled(branch, theme::DIM),
            Span::styled("● ", theme::TEXT.fg(theme::presence(node.present))),
            Span::raw(&node.prefix),
        ];
        if let Some(seq) = node.sequence {
            spans.push(Span::styled(format!(" {seq}"), theme::DIM));
        }
        if let Some(label) = &node.label {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(label.as_str(), theme::nick(label)));
        }

        let style = if is_focused && idx == app.selected_node {
            theme::SELECTED_NODE
        } else {
            theme::TEXT
        };
        ListItem::new(Line::from(spans)).style(style)
    }));

    let block = Block::default()
        .title(Span::styled(" digest tree ", theme::TREE_TITLE))
        .borders(Borders::ALL)
        .border_style(theme::border(is_focused));

    frame.render_widget(List::new(items).block(block), area);
}
