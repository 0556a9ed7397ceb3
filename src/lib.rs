//! viz-scheduler: prioritized, deactivation-aware update scheduling for
//! dashboards of visualization components.
//!
//! The crate is split into a generic scheduling core (`core`), the
//! visualization target model hosted by a [`Dashboard`] (`api`), and the
//! observer surface hosting code hooks into (`extensions`).

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod telemetry;

pub use api::{Dashboard, DashboardConfig};
pub use error::{SchedResult, SchedulerError};
