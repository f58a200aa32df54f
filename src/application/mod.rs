// Application layer - use cases and orchestration.
// Every client (HTTP handlers, CLI, tests) goes through PortalService.

pub mod error;
mod ledger;
pub mod password;
mod service;
mod verification;

pub use error::*;
pub use ledger::*;
pub use service::*;
pub use verification::*;
