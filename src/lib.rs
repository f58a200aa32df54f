pub mod application;
pub mod cli;
pub mod domain;
pub mod http;
pub mod storage;

pub use application::{AppError, PortalConfig, PortalService};
pub use domain::*;
pub use storage::Repository;
