use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::layout::centered_rect;
use crate::network::{AuthChallenge, Credentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    None,
    Cancel,
    Submit(AuthChallenge, Credentials),
}

/// Prompt shown when a page asks for HTTP credentials.
#[derive(Debug, Default)]
pub struct AuthDialog {
    challenge: Option<AuthChallenge>,
    username: String,
    password: String,
    focus: Option<AuthField>,
}

impl AuthDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn prompt(&mut self, challenge: AuthChallenge) {
        self.challenge = Some(challenge);
        self.username.clear();
        self.password.clear();
        self.focus = Some(AuthField::Username);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AuthAction {
        if self.challenge.is_none() {
            return AuthAction::None;
        }

        match key.code {
            KeyCode::Esc => {
                self.challenge = None;
                AuthAction::Cancel
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    Some(AuthField::Username) => Some(AuthField::Password),
                    _ => Some(AuthField::Username),
                };
                AuthAction::None
            }
            KeyCode::Enter => match self.challenge.take() {
                Some(challenge) => AuthAction::Submit(
                    challenge,
                    Credentials {
                        username: std::mem::take(&mut self.username),
                        password: std::mem::take(&mut self.password),
                    },
                ),
                None => AuthAction::None,
            },
            KeyCode::Char(c) => {
                self.active_buffer().push(c);
                AuthAction::None
            }
            KeyCode::Backspace => {
                self.active_buffer().pop();
                AuthAction::None
            }
            _ => AuthAction::None,
        }
    }

    fn active_buffer(&mut self) -> &mut String {
        match self.focus {
            Some(AuthField::Password) => &mut self.password,
            _ => &mut self.username,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(challenge) = self.challenge.as_ref() else {
            return;
        };

        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(" Authentication required ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(1),
            ])
            .margin(1)
            .split(inner);

        let realm = if challenge.realm.is_empty() {
            String::new()
        } else {
            format!(" (realm \"{}\")", challenge.realm)
        };
        let intro = Paragraph::new(format!("{} wants a username and password{}.", challenge.host, realm))
            .wrap(Wrap { trim: true });
        frame.render_widget(intro, chunks[0]);

        let style_for = |field: AuthField| {
            if self.focus == Some(field) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            }
        };

        let username = Paragraph::new(self.username.as_str()).block(
            Block::default()
                .title("Username")
                .borders(Borders::ALL)
                .border_style(style_for(AuthField::Username)),
        );
        frame.render_widget(username, chunks[1]);

        let masked = "*".repeat(self.password.chars().count());
        let password = Paragraph::new(masked).block(
            Block::default()
                .title("Password")
                .borders(Borders::ALL)
                .border_style(style_for(AuthField::Password)),
        );
        frame.render_widget(password, chunks[2]);

        let help = Paragraph::new(Line::from("Tab: Switch field  Enter: Log in  Esc: Cancel"))
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(help, chunks[3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn challenge() -> AuthChallenge {
        AuthChallenge {
            url: "https://news.example.com/feed".to_string(),
            host: "news.example.com".to_string(),
            realm: "members".to_string(),
        }
    }

    #[test]
    fn submits_typed_credentials() {
        let mut dialog = AuthDialog::new();
        dialog.prompt(challenge());
        assert!(dialog.is_visible());

        for c in "bob".chars() {
            dialog.handle_key(key(KeyCode::Char(c)));
        }
        dialog.handle_key(key(KeyCode::Tab));
        for c in "hunter2".chars() {
            dialog.handle_key(key(KeyCode::Char(c)));
        }

        let action = dialog.handle_key(key(KeyCode::Enter));
        assert_eq!(
            action,
            AuthAction::Submit(
                challenge(),
                Credentials {
                    username: "bob".to_string(),
                    password: "hunter2".to_string(),
                }
            )
        );
        assert!(!dialog.is_visible());
    }

    #[test]
    fn escape_cancels() {
        let mut dialog = AuthDialog::new();
        dialog.prompt(challenge());
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), AuthAction::Cancel);
        assert!(!dialog.is_visible());
    }
}
