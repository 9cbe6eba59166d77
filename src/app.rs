use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::{database, Settings};
use crate::crypto::TextCodec;
use crate::db::factory::{self, BackendSummary};
use crate::db::{ConnectionTester, Drivers};
use crate::instance::{InstanceListener, APP_IS_RUNNING};
use crate::network::WebNetworkManager;
use crate::settings::DatabasePanel;
use crate::ui::{AuthAction, AuthDialog, DialogAction, SettingsDialog, WebView};
use crate::vim::{VimCommand, VimState};

const WORKER_THREADS: usize = 2;

pub struct App {
    pub should_quit: bool,
    /// Set when the terminal must be cleared before the next draw.
    pub redraw_requested: bool,
    pub vim_state: VimState,
    pub settings_dialog: SettingsDialog,
    pub auth_dialog: AuthDialog,
    pub web_view: WebView,
    pub backend: Result<BackendSummary, String>,
    pub status_message: Option<String>,
    pub restart_pending: bool,
    settings: Settings,
    codec: TextCodec,
    drivers: Drivers,
    tester: Option<Arc<dyn ConnectionTester>>,
    network: Arc<WebNetworkManager>,
    instance: Option<InstanceListener>,
    runtime: Runtime,
}

impl App {
    pub fn new(
        settings: Settings,
        network: Arc<WebNetworkManager>,
        instance: Option<InstanceListener>,
    ) -> Result<Self> {
        Self::with_drivers(
            settings,
            Drivers::detect(),
            factory::default_tester(),
            network,
            instance,
        )
    }

    pub fn with_drivers(
        settings: Settings,
        drivers: Drivers,
        tester: Option<Arc<dyn ConnectionTester>>,
        network: Arc<WebNetworkManager>,
        instance: Option<InstanceListener>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("tui-rss-worker")
            .enable_all()
            .build()
            .context("Failed to start background runtime")?;

        let mut app = Self {
            should_quit: false,
            redraw_requested: false,
            vim_state: VimState::new(),
            settings_dialog: SettingsDialog::new(),
            auth_dialog: AuthDialog::new(),
            web_view: WebView::new(Arc::clone(&network)),
            backend: Err("Storage not opened yet.".to_string()),
            status_message: None,
            restart_pending: false,
            settings,
            codec: TextCodec::default(),
            drivers,
            tester,
            network,
            instance,
            runtime,
        };

        if !app.settings.contains(&database::ACTIVE_DRIVER) {
            info!("no storage backend chosen yet, using defaults");
        }
        app.reload_backend();
        info!("main window ready");
        Ok(app)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                self.handle_key_event(key)?;
            }
        }
        self.tick();
        Ok(())
    }

    /// Picks up work that finished off the UI thread.
    pub fn tick(&mut self) {
        let messages = self
            .instance
            .as_ref()
            .map(InstanceListener::poll_messages)
            .unwrap_or_default();
        for message in messages {
            self.process_execution_message(&message);
        }

        if let Some(panel) = self.settings_dialog.panel.as_mut() {
            panel.poll_test();
        }

        if let Some(challenge) = self.web_view.poll() {
            self.auth_dialog.prompt(challenge);
        }
    }

    pub fn quit(&mut self) {
        info!("quit requested");
        self.should_quit = true;
    }

    /// Brings the window back to the front and shows `notice`.
    pub fn display(&mut self, notice: &str) {
        self.redraw_requested = true;
        self.status_message = Some(notice.to_string());
    }

    pub fn process_execution_message(&mut self, message: &str) {
        if message == APP_IS_RUNNING {
            info!("another instance tried to start");
            self.display("Application is already running.");
        } else {
            warn!(%message, "unknown message from another instance");
        }
    }

    pub fn cleanup_resources(&mut self) {
        self.web_view.cancel();
        self.settings_dialog.hide();
        if let Some(mut listener) = self.instance.take() {
            listener.release();
        }
        info!("resources released");
    }

    pub fn show_settings(&mut self) {
        let panel = DatabasePanel::load(&self.settings, self.drivers, &self.codec);
        self.settings_dialog.show(panel);
    }

    pub fn reload_backend(&mut self) {
        self.backend = factory::describe_active(&self.settings, self.drivers, &self.codec)
            .map_err(|e| {
                warn!(error = %e, "could not open storage backend");
                format!("✗ Error: {:#}", e)
            });
        if let Err(message) = &self.backend {
            self.status_message = Some(message.clone());
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if self.auth_dialog.is_visible() {
            match self.auth_dialog.handle_key(key) {
                AuthAction::Submit(challenge, credentials) => {
                    self.network.provide_credentials(&challenge, credentials);
                    self.web_view.open(self.runtime.handle(), &challenge.url);
                }
                AuthAction::Cancel => {
                    self.status_message = Some("Authentication cancelled.".to_string());
                }
                AuthAction::None => {}
            }
            return Ok(());
        }

        if self.settings_dialog.visible {
            match self.settings_dialog.handle_key(key) {
                DialogAction::Save => self.save_settings(),
                DialogAction::Test => self.test_connection(),
                DialogAction::Close => self.settings_dialog.hide(),
                DialogAction::None => {}
            }
            return Ok(());
        }

        if let Some(vim_command) = self.vim_state.handle_key(key) {
            self.execute_vim_command(vim_command)?;
        }
        Ok(())
    }

    fn execute_vim_command(&mut self, command: VimCommand) -> Result<()> {
        match command {
            VimCommand::Quit => self.quit(),
            VimCommand::ExecuteCommand(cmd) => self.execute_command(&cmd)?,
            VimCommand::OpenSettings => self.show_settings(),
            VimCommand::ReloadPage => self.web_view.reload(self.runtime.handle()),
            VimCommand::ReloadBackend => self.reload_backend(),
            VimCommand::ScrollDown(count) => self.web_view.scroll_down(count),
            VimCommand::ScrollUp(count) => self.web_view.scroll_up(count),
            VimCommand::GotoTop => self.web_view.goto_top(),
            VimCommand::GotoBottom => self.web_view.goto_bottom(),
            VimCommand::EnterCommandMode | VimCommand::CancelCommand => {}
        }
        Ok(())
    }

    fn execute_command(&mut self, cmd: &str) -> Result<()> {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        match parts[0] {
            "q" | "quit" => self.quit(),
            "settings" => self.show_settings(),
            "open" => {
                if parts.len() < 2 {
                    self.status_message = Some("Usage: open <url>".to_string());
                    return Ok(());
                }
                let url = parts[1..].join(" ");
                self.web_view.open(self.runtime.handle(), &url);
            }
            "reload" => self.reload_backend(),
            "forget" => {
                let hosts = self.network.forget_credentials();
                self.status_message = Some(format!("Forgot credentials for {} host(s).", hosts));
            }
            other => {
                self.status_message = Some(format!("Unknown command: {}", other));
            }
        }
        Ok(())
    }

    fn save_settings(&mut self) {
        let Some(panel) = self.settings_dialog.panel.as_ref() else {
            return;
        };

        match panel.save(&mut self.settings, &self.codec) {
            Ok(outcome) => {
                if outcome.restart_required {
                    self.restart_pending = true;
                    self.status_message =
                        Some("Restart required to apply the database settings.".to_string());
                } else {
                    self.status_message = Some("Settings saved.".to_string());
                }
                self.settings_dialog.hide();
            }
            Err(e) => {
                warn!(error = %e, "saving database settings failed");
                self.status_message = Some(format!("✗ Error: {:#}", e));
            }
        }
    }

    fn test_connection(&mut self) {
        let Some(tester) = self.tester.clone() else {
            self.status_message = Some("This build has no networked SQL driver.".to_string());
            return;
        };
        if let Some(panel) = self.settings_dialog.panel.as_mut() {
            panel.begin_test(self.runtime.handle(), tester);
        }
    }
}
