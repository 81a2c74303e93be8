//! Terminal front ends: line console, interactive menu, live dashboard

pub mod console;
mod dashboard;
mod menu;

pub use dashboard::RunDashboard;
pub use menu::MenuApp;
