//! Terminal rendering of the [`App`] view model.

pub mod chat_panel;
pub mod status_bar;
pub mod theme;
pub mod tree_panel;

use ratatui::{
    Frame,
    layout::{Constraint, Layout},
};

use crate::app::App;

/// Draw one frame: transcript beside the digest tree, status line below.
pub fn draw(frame: &mut Frame, app: &App) {
    let [body, status] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());
    let [chat, tree] =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)]).areas(body);

    chat_panel::render(frame, chat, app);
    tree_panel::render(frame, tree, app);
    status_bar::render(frame, status, app);
}
