//! Transcript and input line.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::theme;
use crate::app::{App, DisplayMessage, MessageKind, PanelFocus};

const PLACEHOLDER: &str = "Type a message, or /nick /room /prefix /quit";

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let [transcript, input] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(area);

    render_transcript(frame, transcript, app);
    render_input(frame, input, app);
}

fn transcript_line(msg: &DisplayMessage) -> Line<'_> {
    let mut spans = vec![
        Span::styled(msg.timestamp.as_str(), theme::TIMESTAMP),
        Span::raw(" "),
    ];
    match msg.kind {
        MessageKind::Chat => {
            spans.push(Span::styled(msg.sender.as_str(), theme::nick(&msg.sender)));
            spans.push(Span::raw(": "));
            spans.push(Span::styled(msg.content.as_str(), theme::TEXT));
        }
        MessageKind::System => spans.push(Span::styled(msg.content.as_str(), theme::NOTICE)),
    }
    Line::from(spans)
}

fn render_transcript(frame: &mut Frame, area: Rect, app: &App) {
    let title = app
        .topic
        .as_deref()
        .map_or_else(|| " chat ".to_string(), |topic| format!(" {topic} "));
    let block = Block::default()
        .title(Span::styled(title, theme::CHAT_TITLE))
        .borders(Borders::ALL)
        .border_style(theme::border(app.focus == PanelFocus::Chat));

    let items: Vec<ListItem> = app
        .messages
        .iter()
        .map(|msg| ListItem::new(transcript_line(msg)))
        .collect();

    // Selecting the scroll position keeps it on screen.
    let mut state = ListState::default();
    if !app.messages.is_empty() {
        state.select(Some(app.message_scroll));
    }
    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == PanelFocus::Input;

    let line = if focused {
        let at = app
            .input
            .char_indices()
            .nth(app.cursor_position)
            .map_or(app.input.len(), |(i, _)| i);
        let mut text = app.input.clone();
        text.insert(at, '█');
        Line::from(Span::styled(text, theme::INPUT))
    } else if app.input.is_empty() {
        Line::from(Span::styled(PLACEHOLDER, theme::DIM))
    } else {
        Line::from(Span::styled(app.input.as_str(), theme::INPUT))
    };

    let block = Block::default()
        .title(" message ")
        .borders(Borders::ALL)
        .border_style(theme::border(focused));
    frame.render_widget(Paragraph::new(line).block(block), area);
}
