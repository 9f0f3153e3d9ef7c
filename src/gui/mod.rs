//! Terminal user interface for live monitoring.

mod aec_dashboard;
mod error;

pub use aec_dashboard::aec_dashboard;
pub use error::GuiError;
