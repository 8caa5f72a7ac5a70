//! Terminal dashboard for beanstalkd.
//!
//! Composes scrollable stats grids into a single screen with a focus-driven
//! input loop and a background stats poller.

mod control;
mod dashboard;
mod event;
mod grid;
mod poll;
mod style;

pub use control::Control;
pub use dashboard::{Dashboard, DashboardConfig, DashboardError};
pub use grid::{GridColumn, ScrollableGrid, TextAlign};
