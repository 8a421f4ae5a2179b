pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod form;
pub mod poi;
pub mod session;
pub mod timeline;
pub mod trip;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use session::{PreviewSession, TripSession, WizardStep};
