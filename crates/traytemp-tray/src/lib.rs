//! Tray side of traytemp
//!
//! Refresh scheduling and snapshot publishing, the tray icon, the popup chart
//! model and the command loop that stands in for the tray menu.

pub mod app;
pub mod chart;
pub mod commands;
pub mod error_mapping;
pub mod icon;
pub mod plot;
pub mod presenter;
pub mod service;

pub use app::{
    run_command_loop, run_refresh_loop, run_render_loop, wall_clock, Clock, CommandContext,
    RefreshRequest,
};
pub use chart::ChartView;
pub use commands::{CommandParseError, TrayCommand};
pub use error_mapping::WeatherErrorExt;
pub use presenter::{FileIconSink, IconSink, TrayPresenter};
pub use service::{RefreshScheduler, Snapshot, SnapshotReceiver};
