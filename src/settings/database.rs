//! Database backend settings: load, live validation, connection probe, save.
//!
//! Pure logic over plain values. `ui::settings_dialog` binds it to widgets.

use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{database, Settings};
use crate::crypto::CredentialCodec;
use crate::db::factory::human_driver_name;
use crate::db::{ConnectionParams, ConnectionTester, DriverChoice, Drivers, TestCode};
use crate::task::{self, Outcome, Pending};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
    Information,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStatus {
    pub level: StatusLevel,
    pub message: String,
}

impl FieldStatus {
    fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Validated text fields of the networked SQL profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkField {
    Hostname,
    Username,
    Password,
    Database,
}

impl NetworkField {
    pub const ALL: [NetworkField; 4] = [
        NetworkField::Hostname,
        NetworkField::Username,
        NetworkField::Password,
        NetworkField::Database,
    ];

    pub fn placeholder(self) -> &'static str {
        match self {
            NetworkField::Hostname => "Hostname of your MySQL server",
            NetworkField::Username => "Username to login with",
            NetworkField::Password => "Password for your username",
            NetworkField::Database => "Working database which you have full access to.",
        }
    }

    fn index(self) -> usize {
        match self {
            NetworkField::Hostname => 0,
            NetworkField::Username => 1,
            NetworkField::Password => 2,
            NetworkField::Database => 3,
        }
    }
}

/// Live status of one field. Never fails.
pub fn validate_field(field: NetworkField, value: &str) -> FieldStatus {
    let (empty, fine) = match field {
        NetworkField::Hostname => ("Hostname is empty.", "Hostname looks ok."),
        NetworkField::Username => ("Username is empty.", "Username looks ok."),
        NetworkField::Password => ("Password is empty.", "Password looks ok."),
        NetworkField::Database => ("Working database is empty.", "Working database is ok."),
    };

    if value.is_empty() {
        FieldStatus::new(StatusLevel::Warning, empty)
    } else {
        FieldStatus::new(StatusLevel::Ok, fine)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatus {
    pub level: StatusLevel,
    pub summary: String,
    pub detail: String,
    pub tested_at: Option<chrono::DateTime<chrono::Local>>,
}

impl TestStatus {
    fn info(summary: &str, detail: &str) -> Self {
        Self {
            level: StatusLevel::Information,
            summary: summary.to_string(),
            detail: detail.to_string(),
            tested_at: None,
        }
    }

    pub fn not_run() -> Self {
        Self::info(
            "No connection test triggered so far.",
            "You have not executed any connection test yet.",
        )
    }

    /// Maps a probe result to what the panel shows. A missing database still
    /// counts as success.
    pub fn from_probe(code: TestCode, interpretation: String) -> Self {
        let level = if code.is_reachable() {
            StatusLevel::Ok
        } else {
            StatusLevel::Error
        };
        Self {
            level,
            summary: interpretation.clone(),
            detail: interpretation,
            tested_at: Some(chrono::Local::now()),
        }
    }
}

/// Entry of the driver selector; `id` is the persisted driver id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverItem {
    pub label: String,
    pub id: String,
}

impl DriverItem {
    fn of(driver: DriverChoice) -> Self {
        Self {
            label: human_driver_name(driver).to_string(),
            id: driver.id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverView {
    Sqlite,
    NetworkedSql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub restart_required: bool,
}

pub struct DatabasePanel {
    items: Vec<DriverItem>,
    selected: usize,
    view: DriverView,
    networked_available: bool,

    pub use_in_memory: bool,

    fields: [String; 4],
    statuses: [FieldStatus; 4],
    /// Port as typed. 0 means the field was cleared and is being retyped.
    pub port: u16,
    pub show_password: bool,

    test_status: TestStatus,
    probe: Option<Pending<(TestCode, String)>>,
}

impl DatabasePanel {
    pub const MIN_PORT: u16 = 1;

    /// Builds the panel from persisted settings.
    ///
    /// The networked fields are only read when the driver is available. A
    /// persisted driver that is not offered leaves the selector on its first
    /// entry.
    pub fn load(settings: &Settings, drivers: Drivers, codec: &dyn CredentialCodec) -> Self {
        let mut items = vec![DriverItem::of(DriverChoice::Sqlite)];
        let networked_available = drivers.is_available(DriverChoice::NetworkedSql);

        let mut panel = Self {
            items: Vec::new(),
            selected: 0,
            view: DriverView::Sqlite,
            networked_available,
            use_in_memory: settings.value(&database::USE_IN_MEMORY),
            fields: Default::default(),
            statuses: NetworkField::ALL.map(|f| validate_field(f, "")),
            port: 0,
            show_password: false,
            test_status: TestStatus::not_run(),
            probe: None,
        };

        if networked_available {
            items.push(DriverItem::of(DriverChoice::NetworkedSql));

            panel.set_field(NetworkField::Hostname, settings.value(&database::MYSQL_HOSTNAME));
            panel.set_field(NetworkField::Username, settings.value(&database::MYSQL_USERNAME));
            panel.set_field(
                NetworkField::Password,
                codec.decode(&settings.value(&database::MYSQL_PASSWORD)),
            );
            panel.set_field(NetworkField::Database, settings.value(&database::MYSQL_DATABASE));
            panel.port = settings.value(&database::MYSQL_PORT).max(Self::MIN_PORT);
        }
        panel.items = items;

        let persisted = settings.value(&database::ACTIVE_DRIVER);
        match panel.items.iter().position(|item| item.id == persisted) {
            Some(index) => panel.select_driver(index),
            None => {
                debug!(driver = %persisted, "persisted driver not offered, keeping first entry");
                panel.select_driver(0);
            }
        }

        panel
    }

    pub fn items(&self) -> &[DriverItem] {
        &self.items
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_driver_id(&self) -> &str {
        self.items
            .get(self.selected)
            .map(|item| item.id.as_str())
            .unwrap_or(DriverChoice::SQLITE_ID)
    }

    pub fn view(&self) -> DriverView {
        self.view
    }

    pub fn networked_available(&self) -> bool {
        self.networked_available
    }

    /// Moves the selector and shows the matching configuration view. Unknown
    /// driver ids are logged and change nothing.
    pub fn select_driver(&mut self, index: usize) {
        let Some(item) = self.items.get(index) else {
            warn!(index, "driver selector index out of range");
            return;
        };

        match DriverChoice::from_id(&item.id) {
            Some(DriverChoice::Sqlite) => self.view = DriverView::Sqlite,
            Some(DriverChoice::NetworkedSql) => self.view = DriverView::NetworkedSql,
            None => {
                warn!(driver = %item.id, "no settings view for database driver");
                return;
            }
        }
        self.selected = index;
    }

    pub fn cycle_driver(&mut self, forward: bool) {
        if self.items.is_empty() {
            return;
        }
        let len = self.items.len();
        let next = if forward {
            (self.selected + 1) % len
        } else {
            (self.selected + len - 1) % len
        };
        self.select_driver(next);
    }

    pub fn field(&self, field: NetworkField) -> &str {
        &self.fields[field.index()]
    }

    pub fn status(&self, field: NetworkField) -> &FieldStatus {
        &self.statuses[field.index()]
    }

    /// Replaces a field's text and revalidates it.
    pub fn set_field(&mut self, field: NetworkField, value: String) {
        self.statuses[field.index()] = validate_field(field, &value);
        self.fields[field.index()] = value;
    }

    pub fn edit_field(&mut self, field: NetworkField, edit: impl FnOnce(&mut String)) {
        let mut value = std::mem::take(&mut self.fields[field.index()]);
        edit(&mut value);
        self.set_field(field, value);
    }

    /// What the password field shows.
    pub fn password_display(&self) -> String {
        let password = self.field(NetworkField::Password);
        if self.show_password {
            password.to_string()
        } else {
            "•".repeat(password.chars().count())
        }
    }

    pub fn toggle_password_visibility(&mut self) {
        self.show_password = !self.show_password;
    }

    pub fn adjust_port(&mut self, delta: i32) {
        let port = (i32::from(self.port) + delta).clamp(i32::from(Self::MIN_PORT), i32::from(u16::MAX));
        self.port = port as u16;
    }

    /// Appends a digit the way a spin box would, ignoring overflow.
    pub fn push_port_digit(&mut self, digit: u32) {
        let next = u32::from(self.port) * 10 + digit;
        if let Ok(port) = u16::try_from(next) {
            self.port = port;
        }
    }

    pub fn pop_port_digit(&mut self) {
        self.port /= 10;
    }

    /// The port used for tests and saves, never below [`Self::MIN_PORT`].
    pub fn effective_port(&self) -> u16 {
        self.port.max(Self::MIN_PORT)
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            hostname: self.field(NetworkField::Hostname).to_string(),
            port: self.effective_port(),
            database: self.field(NetworkField::Database).to_string(),
            username: self.field(NetworkField::Username).to_string(),
            password: self.field(NetworkField::Password).to_string(),
        }
    }

    pub fn test_status(&self) -> &TestStatus {
        &self.test_status
    }

    pub fn is_testing(&self) -> bool {
        self.probe.is_some()
    }

    /// Starts a connection probe with the current field values. A running
    /// probe is cancelled first.
    pub fn begin_test(&mut self, handle: &Handle, tester: Arc<dyn ConnectionTester>) {
        self.cancel_probe();

        let params = self.connection_params();
        debug!(host = %params.hostname, port = params.port, "starting connection test");
        self.probe = Some(task::spawn_blocking(handle, move || {
            let code = tester.test(&params);
            (code, tester.interpret(code))
        }));
        self.test_status = TestStatus::info(
            "Testing connection...",
            "Waiting for the database server to answer.",
        );
    }

    /// Applies a finished probe. Returns true when a result was applied.
    pub fn poll_test(&mut self) -> bool {
        let Some(probe) = self.probe.as_mut() else {
            return false;
        };
        let Some(outcome) = probe.try_take() else {
            return false;
        };
        self.probe = None;

        self.test_status = match outcome {
            Outcome::Done((code, interpretation)) => {
                info!(?code, "connection test finished");
                TestStatus::from_probe(code, interpretation)
            }
            Outcome::Cancelled => {
                TestStatus::info("Connection test cancelled.", "The connection test was cancelled.")
            }
            Outcome::Failed(reason) => {
                warn!(%reason, "connection test did not complete");
                TestStatus {
                    level: StatusLevel::Error,
                    summary: "Connection test failed to run.".to_string(),
                    detail: reason,
                    tested_at: Some(chrono::Local::now()),
                }
            }
        };
        true
    }

    pub fn cancel_test(&mut self) {
        if self.cancel_probe() {
            self.test_status =
                TestStatus::info("Connection test cancelled.", "The connection test was cancelled.");
        }
    }

    fn cancel_probe(&mut self) -> bool {
        match self.probe.take() {
            Some(mut probe) => {
                probe.cancel();
                true
            }
            None => false,
        }
    }

    /// Writes the panel back to `settings` and flushes it once.
    ///
    /// Networked keys are only written when the driver is available. A failed
    /// flush leaves `settings` untouched. Restart is required when the driver
    /// or the in-memory flag differ from what was persisted before this call.
    pub fn save(
        &self,
        settings: &mut Settings,
        codec: &dyn CredentialCodec,
    ) -> Result<SaveOutcome> {
        let original_in_memory = settings.value(&database::USE_IN_MEMORY);
        let original_driver = settings.value(&database::ACTIVE_DRIVER);
        let selected_driver = self.selected_driver_id().to_string();

        // Writes go to a copy that replaces the store only once it is on disk.
        let mut staged = settings.clone();
        staged.set_value(&database::USE_IN_MEMORY, &self.use_in_memory)?;

        if self.networked_available {
            staged.set_value(
                &database::MYSQL_HOSTNAME,
                &self.field(NetworkField::Hostname).to_string(),
            )?;
            staged.set_value(
                &database::MYSQL_USERNAME,
                &self.field(NetworkField::Username).to_string(),
            )?;
            staged.set_value(
                &database::MYSQL_PASSWORD,
                &codec.encode(self.field(NetworkField::Password)),
            )?;
            staged.set_value(
                &database::MYSQL_DATABASE,
                &self.field(NetworkField::Database).to_string(),
            )?;
            staged.set_value(&database::MYSQL_PORT, &self.effective_port())?;
        }

        staged.set_value(&database::ACTIVE_DRIVER, &selected_driver)?;
        staged.sync()?;
        *settings = staged;

        let restart_required =
            original_driver != selected_driver || original_in_memory != self.use_in_memory;
        if restart_required {
            info!(driver = %selected_driver, in_memory = self.use_in_memory, "database settings changed, restart required");
        }
        Ok(SaveOutcome { restart_required })
    }
}

impl Drop for DatabasePanel {
    fn drop(&mut self) {
        self.cancel_probe();
    }
}
