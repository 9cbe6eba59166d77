pub mod auth_dialog;
pub mod layout;
pub mod settings_dialog;
pub mod web_view;

pub use auth_dialog::{AuthAction, AuthDialog};
pub use layout::render;
pub use settings_dialog::{DialogAction, SettingsDialog};
pub use web_view::WebView;
