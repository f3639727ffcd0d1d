//! UI widgets for displaying sensor data.

pub mod reading_panel;

pub use reading_panel::render_reading_panel;
