pub mod columns;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod periods;
pub mod process;
pub mod relay;
pub mod session;
pub mod view;

pub use config::DashboardConfig;
pub use process::{parse_matrix, Matrix};
