use crate::app::App;
use crate::db::factory::human_driver_name;
use crate::settings::StatusLevel;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.area();

    // Top bar, content, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    render_top_bar(frame, chunks[0]);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[1]);

    render_backend(frame, content_chunks[0], app);
    app.web_view.render(frame, content_chunks[1]);

    render_status_bar(frame, chunks[2], app);

    // Popups go last so they draw over the panes
    app.settings_dialog.render(frame, size);
    app.auth_dialog.render(frame, size);
}

fn render_top_bar(frame: &mut Frame, area: Rect) {
    let title = vec![
        Span::styled("TUI-RSS", Style::default().fg(Color::Cyan)),
        Span::raw(" - Terminal Feed Reader"),
    ];

    let paragraph = Paragraph::new(Line::from(title)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_backend(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Storage ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    match &app.backend {
        Ok(summary) => {
            let mut items = vec![
                ListItem::new(Line::from(vec![
                    Span::styled("Driver: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        human_driver_name(summary.driver),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ])),
                ListItem::new(Line::from(vec![
                    Span::styled("Location: ", Style::default().fg(Color::DarkGray)),
                    Span::raw(summary.location.as_str()),
                ])),
                ListItem::new(""),
            ];

            if summary.tables.is_empty() {
                items.push(ListItem::new(Span::styled(
                    "No tables yet",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            for table in &summary.tables {
                let count = table
                    .row_count
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default();
                items.push(ListItem::new(format!("  {}{}", table.name, count)));
            }

            frame.render_widget(List::new(items).block(block), area);
        }
        Err(message) => {
            let paragraph = Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(ratatui::widgets::Wrap { trim: true })
                .block(block);
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let mode_color = match app.vim_state.mode {
        crate::vim::VimMode::Normal => Color::Blue,
        crate::vim::VimMode::Command => Color::Yellow,
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.vim_state.mode.as_str()),
            Style::default().fg(Color::Black).bg(mode_color),
        ),
        Span::raw("  "),
    ];

    if app.vim_state.mode == crate::vim::VimMode::Command {
        spans.push(Span::styled(
            format!(":{}", app.vim_state.get_command()),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::raw("  "));
    }

    if app.restart_pending {
        spans.push(Span::styled(
            "[Restart required] ",
            Style::default().fg(Color::Black).bg(Color::Red),
        ));
        spans.push(Span::raw(" "));
    }

    match &app.status_message {
        Some(message) => spans.push(Span::styled(message.as_str(), Style::default().fg(Color::Green))),
        None => spans.push(Span::styled(
            "Press ':' for commands, 's' for settings, 'q' to quit",
            Style::default().fg(Color::DarkGray),
        )),
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

pub(crate) fn status_color(level: StatusLevel) -> Color {
    match level {
        StatusLevel::Ok => Color::Green,
        StatusLevel::Warning => Color::Yellow,
        StatusLevel::Error => Color::Red,
        StatusLevel::Information => Color::Cyan,
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(60, 50, outer);
        assert!(inner.x >= outer.x && inner.right() <= outer.right());
        assert!(inner.y >= outer.y && inner.bottom() <= outer.bottom());
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 20);
    }
}
