use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

use crate::error::NetworkError;
use crate::network::{AuthChallenge, FetchOutcome, WebNetworkManager};
use crate::task::{self, Outcome, Pending};

/// Plain-text browser pane. Every view talks through the shared manager.
pub struct WebView {
    manager: Arc<WebNetworkManager>,
    pub url: Option<String>,
    pub lines: Vec<String>,
    pub scroll: usize,
    pub status: String,
    pending: Option<Pending<Result<FetchOutcome, NetworkError>>>,
}

impl WebView {
    pub fn new(manager: Arc<WebNetworkManager>) -> Self {
        Self {
            manager,
            url: None,
            lines: Vec::new(),
            scroll: 0,
            status: "Use :open <url> to load a page.".to_string(),
            pending: None,
        }
    }

    pub fn open(&mut self, handle: &Handle, url: &str) {
        self.cancel();

        let manager = Arc::clone(&self.manager);
        let target = url.to_string();
        self.pending = Some(task::spawn_blocking(handle, move || manager.fetch(&target)));
        self.url = Some(url.to_string());
        self.status = format!("Loading {}...", url);
    }

    pub fn reload(&mut self, handle: &Handle) {
        if let Some(url) = self.url.clone() {
            self.open(handle, &url);
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            pending.cancel();
        }
    }

    /// Applies a finished fetch. Returns the challenge when the server asks
    /// for credentials.
    pub fn poll(&mut self) -> Option<AuthChallenge> {
        let outcome = self.pending.as_mut()?.try_take()?;
        self.pending = None;

        match outcome {
            Outcome::Done(Ok(FetchOutcome::Page { url, status, body })) => {
                self.lines = body.lines().map(str::to_string).collect();
                self.scroll = 0;
                self.status = format!("HTTP {} - {} ({} lines)", status, url, self.lines.len());
                None
            }
            Outcome::Done(Ok(FetchOutcome::AuthenticationRequired(challenge))) => {
                self.status = format!("Authentication required by {}", challenge.host);
                Some(challenge)
            }
            Outcome::Done(Err(e)) => {
                warn!(error = %e, "page fetch failed");
                self.status = format!("Error: {}", e);
                None
            }
            Outcome::Cancelled => {
                self.status = "Loading cancelled.".to_string();
                None
            }
            Outcome::Failed(reason) => {
                self.status = format!("Error: {}", reason);
                None
            }
        }
    }

    pub fn scroll_down(&mut self, count: usize) {
        let max = self.lines.len().saturating_sub(1);
        self.scroll = (self.scroll + count).min(max);
    }

    pub fn scroll_up(&mut self, count: usize) {
        self.scroll = self.scroll.saturating_sub(count);
    }

    pub fn goto_top(&mut self) {
        self.scroll = 0;
    }

    pub fn goto_bottom(&mut self) {
        self.scroll = self.lines.len().saturating_sub(1);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.url {
            Some(url) => format!(" Browser: {} ", url),
            None => " Browser ".to_string(),
        };

        let height = area.height.saturating_sub(3) as usize;
        let mut lines: Vec<Line> = self
            .lines
            .iter()
            .skip(self.scroll)
            .take(height)
            .map(|l| Line::from(l.as_str()))
            .collect();
        lines.push(Line::from(Span::styled(
            self.status.as_str(),
            Style::default().fg(Color::DarkGray),
        )));

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrolling_is_bounded() {
        let mut view = WebView::new(Arc::new(WebNetworkManager::new()));
        view.lines = (0..10).map(|i| i.to_string()).collect();

        view.scroll_down(4);
        assert_eq!(view.scroll, 4);
        view.scroll_down(100);
        assert_eq!(view.scroll, 9);
        view.scroll_up(100);
        assert_eq!(view.scroll, 0);
        view.goto_bottom();
        assert_eq!(view.scroll, 9);
        view.goto_top();
        assert_eq!(view.scroll, 0);
    }

    #[test]
    fn reload_without_page_does_nothing() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut view = WebView::new(Arc::new(WebNetworkManager::new()));
        view.reload(runtime.handle());
        assert!(!view.is_loading());
        assert!(view.poll().is_none());
    }
}
