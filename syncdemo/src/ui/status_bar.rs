//! Bottom status line: room binding, user settings and key help.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::config::Settings;

const fn key_help(focus: PanelFocus) -> &'static str {
    match focus {
        PanelFocus::Input => "Enter: send | Tab: next panel | Esc: quit",
        PanelFocus::Chat => "↑↓/jk: scroll | Tab: next panel | Esc: quit",
        PanelFocus::Tree => "↑↓/jk: select node | Tab: next panel | Esc: quit",
    }
}

/// `nick@room prefix`, with `?` for anything not set yet.
fn settings_spans(settings: &Settings) -> Vec<Span<'_>> {
    let nick = settings.nick().unwrap_or("?");
    vec![
        Span::styled(nick, theme::nick(nick)),
        Span::styled(format!("@{}", settings.chatroom().unwrap_or("?")), theme::TEXT),
        Span::styled(format!(" {}", settings.prefix().unwrap_or("?")), theme::DIM),
    ]
}

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let binding = match (&app.topic, app.session) {
        (Some(topic), Some(session)) => vec![
            Span::styled("● ", theme::TEXT.fg(theme::presence(true))),
            Span::raw(topic.as_str()),
            Span::styled(format!(" session {session}"), theme::DIM),
        ],
        _ => vec![
            Span::styled("● ", theme::TEXT.fg(theme::presence(false))),
            Span::raw("not joined"),
        ],
    };

    let mut spans = vec![Span::styled("syncdemo ", theme::STRONG)];
    spans.extend(binding);
    spans.push(Span::raw(" | "));
    spans.extend(settings_spans(&app.settings));
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(key_help(app.focus), theme::DIM));

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(theme::STATUS_BAR),
        area,
    );
}
