//! Latest reading widget.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::ui::app::{App, HELP_TEXT};

/// Build the lines of the view
pub fn reading_lines(app: &App) -> Vec<Line<'static>> {
    let status_style = if app.has_error() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(app.spinner_glyph(), Style::default().fg(Color::Magenta)),
            Span::raw(" "),
            Span::styled(app.status_text(), status_style),
            Span::raw(" "),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!(" {HELP_TEXT}"),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    if app.is_quitting() {
        lines.push(Line::from(""));
    }

    lines
}

/// Render the spinner, the reading or error, and the exit hint
pub fn render_reading_panel(frame: &mut Frame, area: Rect, app: &App) {
    frame.render_widget(Paragraph::new(reading_lines(app)), area);
}
