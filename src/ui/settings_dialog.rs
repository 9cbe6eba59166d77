use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::layout::{centered_rect, status_color};
use crate::settings::database::{DatabasePanel, DriverView, NetworkField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogField {
    Driver,
    InMemory,
    Hostname,
    Port,
    Username,
    Password,
    Database,
}

impl DialogField {
    fn order(view: DriverView) -> &'static [DialogField] {
        match view {
            DriverView::Sqlite => &[DialogField::Driver, DialogField::InMemory],
            DriverView::NetworkedSql => &[
                DialogField::Driver,
                DialogField::Hostname,
                DialogField::Port,
                DialogField::Username,
                DialogField::Password,
                DialogField::Database,
            ],
        }
    }

    fn text_field(self) -> Option<NetworkField> {
        match self {
            DialogField::Hostname => Some(NetworkField::Hostname),
            DialogField::Username => Some(NetworkField::Username),
            DialogField::Password => Some(NetworkField::Password),
            DialogField::Database => Some(NetworkField::Database),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    None,
    Close,
    Save,
    Test,
}

/// Settings dialog hosting the database panel.
pub struct SettingsDialog {
    pub visible: bool,
    pub focus: DialogField,
    pub panel: Option<DatabasePanel>,
}

impl SettingsDialog {
    pub fn new() -> Self {
        Self {
            visible: false,
            focus: DialogField::Driver,
            panel: None,
        }
    }

    pub fn show(&mut self, panel: DatabasePanel) {
        self.panel = Some(panel);
        self.focus = DialogField::Driver;
        self.visible = true;
    }

    /// Hides the dialog and drops the panel, cancelling a running probe.
    pub fn hide(&mut self) {
        self.visible = false;
        self.panel = None;
    }

    fn fields(&self) -> &'static [DialogField] {
        let view = self
            .panel
            .as_ref()
            .map(DatabasePanel::view)
            .unwrap_or(DriverView::Sqlite);
        DialogField::order(view)
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + 1) % fields.len()];
    }

    pub fn prev_field(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + fields.len() - 1) % fields.len()];
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> DialogAction {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);

        if !control {
            match key.code {
                KeyCode::Esc => return DialogAction::Close,
                KeyCode::Tab | KeyCode::Down => {
                    self.next_field();
                    return DialogAction::None;
                }
                KeyCode::BackTab | KeyCode::Up => {
                    self.prev_field();
                    return DialogAction::None;
                }
                _ => {}
            }
        }

        let focus = self.focus;
        let Some(panel) = self.panel.as_mut() else {
            return DialogAction::Close;
        };

        if control {
            return match key.code {
                KeyCode::Char('s') => DialogAction::Save,
                KeyCode::Char('t') if panel.view() == DriverView::NetworkedSql => DialogAction::Test,
                KeyCode::Char('p') => {
                    panel.toggle_password_visibility();
                    DialogAction::None
                }
                KeyCode::Char('x') => {
                    panel.cancel_test();
                    DialogAction::None
                }
                _ => DialogAction::None,
            };
        }

        match focus {
            DialogField::Driver => match key.code {
                KeyCode::Left => panel.cycle_driver(false),
                KeyCode::Right | KeyCode::Char(' ') => panel.cycle_driver(true),
                _ => {}
            },
            DialogField::InMemory => {
                if key.code == KeyCode::Char(' ') {
                    panel.use_in_memory = !panel.use_in_memory;
                }
            }
            DialogField::Port => match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    panel.push_port_digit(c.to_digit(10).unwrap_or(0));
                }
                KeyCode::Backspace => panel.pop_port_digit(),
                KeyCode::Left | KeyCode::Char('-') => panel.adjust_port(-1),
                KeyCode::Right | KeyCode::Char('+') => panel.adjust_port(1),
                _ => {}
            },
            field => {
                if let Some(text_field) = field.text_field() {
                    match key.code {
                        KeyCode::Char(c) => panel.edit_field(text_field, |s| s.push(c)),
                        KeyCode::Backspace => panel.edit_field(text_field, |s| {
                            s.pop();
                        }),
                        _ => {}
                    }
                }
            }
        }

        // The driver may have changed the visible fields.
        if !self.fields().contains(&self.focus) {
            self.focus = DialogField::Driver;
        }
        DialogAction::None
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if !self.visible {
            return;
        }
        let Some(panel) = self.panel.as_ref() else {
            return;
        };

        let popup_area = centered_rect(80, 80, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(" Settings: Data storage ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Driver selector
                Constraint::Min(6),    // Driver view
                Constraint::Length(5), // Test result
                Constraint::Length(3), // Help
            ])
            .margin(1)
            .split(inner);

        self.render_driver_selector(frame, chunks[0], panel);
        match panel.view() {
            DriverView::Sqlite => self.render_sqlite_view(frame, chunks[1], panel),
            DriverView::NetworkedSql => self.render_networked_view(frame, chunks[1], panel),
        }
        if panel.view() == DriverView::NetworkedSql {
            render_test_status(frame, chunks[2], panel);
        }

        let help = Paragraph::new(vec![
            Line::from("Tab/Shift+Tab: Move  ←/→: Change  Space: Toggle  Ctrl+P: Show password"),
            Line::from("Ctrl+T: Test connection  Ctrl+X: Cancel test  Ctrl+S: Save  Esc: Close"),
        ])
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
        frame.render_widget(help, chunks[3]);
    }

    fn focus_style(&self, field: DialogField) -> Style {
        if self.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    fn render_driver_selector(&self, frame: &mut Frame, area: Rect, panel: &DatabasePanel) {
        let mut spans = Vec::new();
        for (idx, item) in panel.items().iter().enumerate() {
            if idx > 0 {
                spans.push(Span::raw("  "));
            }
            if idx == panel.selected_index() {
                spans.push(Span::styled(
                    format!("◉ {}", item.label),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ));
            } else {
                spans.push(Span::styled(
                    format!("○ {}", item.label),
                    Style::default().fg(Color::DarkGray),
                ));
            }
        }

        let block = Block::default()
            .title("Database driver")
            .borders(Borders::ALL)
            .border_style(self.focus_style(DialogField::Driver));
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn render_sqlite_view(&self, frame: &mut Frame, area: Rect, panel: &DatabasePanel) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(area);

        let mark = if panel.use_in_memory { "[x]" } else { "[ ]" };
        let block = Block::default()
            .title("SQLite")
            .borders(Borders::ALL)
            .border_style(self.focus_style(DialogField::InMemory));
        let checkbox = Paragraph::new(format!("{} Use in-memory database", mark)).block(block);
        frame.render_widget(checkbox, chunks[0]);

        let note = Paragraph::new(
            "An in-memory database is faster, but everything it holds is lost when the \
             application exits. Changing this requires a restart.",
        )
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
        frame.render_widget(note, chunks[1]);
    }

    fn render_networked_view(&self, frame: &mut Frame, area: Rect, panel: &DatabasePanel) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Hostname and port
                Constraint::Length(3), // Username and password
                Constraint::Length(3), // Database
                Constraint::Min(0),
            ])
            .split(area);

        let host_port = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
            .split(rows[0]);
        self.render_text_field(frame, host_port[0], panel, DialogField::Hostname, "Hostname");

        let port_block = Block::default()
            .title("Port")
            .borders(Borders::ALL)
            .border_style(self.focus_style(DialogField::Port));
        frame.render_widget(
            Paragraph::new(match panel.port {
                0 => String::new(),
                port => port.to_string(),
            })
            .block(port_block),
            host_port[1],
        );

        let user_pass = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);
        self.render_text_field(frame, user_pass[0], panel, DialogField::Username, "Username");
        self.render_text_field(frame, user_pass[1], panel, DialogField::Password, "Password");

        self.render_text_field(frame, rows[2], panel, DialogField::Database, "Working database");
    }

    fn render_text_field(
        &self,
        frame: &mut Frame,
        area: Rect,
        panel: &DatabasePanel,
        field: DialogField,
        title: &str,
    ) {
        let Some(text_field) = field.text_field() else {
            return;
        };
        let status = panel.status(text_field);

        let value = if text_field == NetworkField::Password {
            panel.password_display()
        } else {
            panel.field(text_field).to_string()
        };
        let content = if value.is_empty() {
            Line::from(Span::styled(
                text_field.placeholder(),
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::from(value)
        };

        let block = Block::default()
            .title(title)
            .title_bottom(Line::from(Span::styled(
                format!(" {} ", status.message),
                Style::default().fg(status_color(status.level)),
            )))
            .borders(Borders::ALL)
            .border_style(self.focus_style(field));
        frame.render_widget(Paragraph::new(content).block(block), area);
    }
}

fn render_test_status(frame: &mut Frame, area: Rect, panel: &DatabasePanel) {
    let status = panel.test_status();
    let color = status_color(status.level);

    let mut lines = vec![Line::from(Span::styled(
        status.summary.as_str(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];
    if status.detail != status.summary {
        lines.push(Line::from(status.detail.as_str()));
    }
    if let Some(at) = status.tested_at {
        lines.push(Line::from(Span::styled(
            format!("Tested at {}", at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .title("Connection test")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::crypto::TextCodec;
    use crate::db::Drivers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn dialog(drivers: Drivers) -> SettingsDialog {
        let mut dialog = SettingsDialog::new();
        dialog.show(DatabasePanel::load(
            &Settings::in_memory(),
            drivers,
            &TextCodec::default(),
        ));
        dialog
    }

    #[test]
    fn switching_driver_changes_focus_order() {
        let mut dialog = dialog(Drivers::with_networked_sql());
        dialog.next_field();
        assert_eq!(dialog.focus, DialogField::InMemory);

        dialog.prev_field();
        dialog.handle_key(key(KeyCode::Right));
        assert_eq!(dialog.panel.as_ref().unwrap().view(), DriverView::NetworkedSql);
        dialog.next_field();
        assert_eq!(dialog.focus, DialogField::Hostname);
    }

    #[test]
    fn typing_edits_focused_field() {
        let mut dialog = dialog(Drivers::with_networked_sql());
        dialog.handle_key(key(KeyCode::Right));
        dialog.focus = DialogField::Database;
        for _ in 0.."rssguard".len() {
            dialog.handle_key(key(KeyCode::Backspace));
        }
        let panel = dialog.panel.as_ref().unwrap();
        assert_eq!(panel.field(NetworkField::Database), "");
        assert_eq!(
            panel.status(NetworkField::Database).message,
            "Working database is empty."
        );

        dialog.handle_key(key(KeyCode::Char('f')));
        assert_eq!(dialog.panel.as_ref().unwrap().field(NetworkField::Database), "f");
    }

    #[test]
    fn space_toggles_in_memory_flag() {
        let mut dialog = dialog(Drivers::sqlite_only());
        dialog.focus = DialogField::InMemory;
        dialog.handle_key(key(KeyCode::Char(' ')));
        assert!(dialog.panel.as_ref().unwrap().use_in_memory);
    }

    #[test]
    fn control_keys_map_to_actions() {
        let mut dialog = dialog(Drivers::with_networked_sql());
        assert_eq!(dialog.handle_key(ctrl('s')), DialogAction::Save);
        // Testing is only offered on the networked view.
        assert_eq!(dialog.handle_key(ctrl('t')), DialogAction::None);
        dialog.handle_key(key(KeyCode::Right));
        assert_eq!(dialog.handle_key(ctrl('t')), DialogAction::Test);
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), DialogAction::Close);
    }

    #[test]
    fn hiding_drops_the_panel() {
        let mut dialog = dialog(Drivers::sqlite_only());
        dialog.hide();
        assert!(!dialog.visible);
        assert!(dialog.panel.is_none());
    }
}
