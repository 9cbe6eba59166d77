use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VimMode {
    Normal,
    Command,
}

impl VimMode {
    pub fn as_str(&self) -> &str {
        match self {
            VimMode::Normal => "NORMAL",
            VimMode::Command => "COMMAND",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VimState {
    pub mode: VimMode,
    pub command_buffer: String,
    pub count: Option<usize>,
}

impl Default for VimState {
    fn default() -> Self {
        Self {
            mode: VimMode::Normal,
            command_buffer: String::new(),
            count: None,
        }
    }
}

impl VimState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_normal_mode(&mut self) {
        self.mode = VimMode::Normal;
        self.reset_state();
    }

    pub fn enter_command_mode(&mut self) {
        self.mode = VimMode::Command;
        self.command_buffer.clear();
    }

    pub fn get_command(&self) -> &str {
        &self.command_buffer
    }

    fn set_count(&mut self, n: usize) {
        self.count = Some(match self.count {
            Some(existing) => existing.saturating_mul(10).saturating_add(n),
            None => n,
        });
    }

    fn take_count(&mut self) -> usize {
        self.count.take().unwrap_or(1)
    }

    fn reset_state(&mut self) {
        self.command_buffer.clear();
        self.count = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<VimCommand> {
        match self.mode {
            VimMode::Normal => self.handle_normal_mode(key),
            VimMode::Command => self.handle_command_mode(key),
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) -> Option<VimCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(VimCommand::Quit),
                KeyCode::Char('d') => Some(VimCommand::ScrollDown(10)),
                KeyCode::Char('u') => Some(VimCommand::ScrollUp(10)),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(VimCommand::ScrollDown(self.take_count())),
            KeyCode::Char('k') | KeyCode::Up => Some(VimCommand::ScrollUp(self.take_count())),
            KeyCode::Char('g') if self.command_buffer.ends_with('g') => {
                self.command_buffer.clear();
                Some(VimCommand::GotoTop)
            }
            KeyCode::Char('g') => {
                self.command_buffer.push('g');
                None
            }
            KeyCode::Char('G') => Some(VimCommand::GotoBottom),
            KeyCode::Char(':') => {
                self.enter_command_mode();
                Some(VimCommand::EnterCommandMode)
            }
            KeyCode::Char('q') => Some(VimCommand::Quit),
            KeyCode::Char('s') => Some(VimCommand::OpenSettings),
            KeyCode::Char('r') => Some(VimCommand::ReloadPage),
            KeyCode::Char('R') => Some(VimCommand::ReloadBackend),
            KeyCode::Char(c) if c.is_ascii_digit() && (c != '0' || self.count.is_some()) => {
                self.set_count(c as usize - '0' as usize);
                None
            }
            KeyCode::Esc => {
                self.reset_state();
                None
            }
            _ => None,
        }
    }

    fn handle_command_mode(&mut self, key: KeyEvent) -> Option<VimCommand> {
        match key.code {
            KeyCode::Esc => {
                self.enter_normal_mode();
                Some(VimCommand::CancelCommand)
            }
            KeyCode::Enter => {
                let cmd = self.command_buffer.clone();
                self.enter_normal_mode();
                Some(VimCommand::ExecuteCommand(cmd))
            }
            KeyCode::Char(c) => {
                self.command_buffer.push(c);
                None
            }
            KeyCode::Backspace => {
                self.command_buffer.pop();
                if self.command_buffer.is_empty() {
                    self.enter_normal_mode();
                    return Some(VimCommand::CancelCommand);
                }
                None
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VimCommand {
    ScrollUp(usize),
    ScrollDown(usize),
    GotoTop,
    GotoBottom,

    EnterCommandMode,
    CancelCommand,
    ExecuteCommand(String),

    OpenSettings,
    ReloadPage,
    ReloadBackend,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn counts_prefix_scrolling() {
        let mut state = VimState::new();
        assert_eq!(state.handle_key(key(KeyCode::Char('1'))), None);
        assert_eq!(state.handle_key(key(KeyCode::Char('2'))), None);
        assert_eq!(state.handle_key(key(KeyCode::Char('j'))), Some(VimCommand::ScrollDown(12)));
        assert_eq!(state.handle_key(key(KeyCode::Char('k'))), Some(VimCommand::ScrollUp(1)));
    }

    #[test]
    fn double_g_goes_to_top() {
        let mut state = VimState::new();
        assert_eq!(state.handle_key(key(KeyCode::Char('g'))), None);
        assert_eq!(state.handle_key(key(KeyCode::Char('g'))), Some(VimCommand::GotoTop));
    }

    #[test]
    fn command_line_collects_text() {
        let mut state = VimState::new();
        assert_eq!(
            state.handle_key(key(KeyCode::Char(':'))),
            Some(VimCommand::EnterCommandMode)
        );
        for c in "open x".chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(state.get_command(), "open x");
        assert_eq!(
            state.handle_key(key(KeyCode::Enter)),
            Some(VimCommand::ExecuteCommand("open x".to_string()))
        );
        assert_eq!(state.mode, VimMode::Normal);
    }

    #[test]
    fn backspace_on_empty_command_cancels() {
        let mut state = VimState::new();
        state.handle_key(key(KeyCode::Char(':')));
        state.handle_key(key(KeyCode::Char('q')));
        assert_eq!(state.handle_key(key(KeyCode::Backspace)), Some(VimCommand::CancelCommand));
        assert_eq!(state.mode, VimMode::Normal);
    }
}
