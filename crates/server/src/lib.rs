pub mod api;
pub mod metrics;
pub mod settings;
pub mod state;
