mod broker;
mod broker_code;
mod commission;
mod ledger;
mod listing;
mod money;
mod verification;
mod withdrawal;

pub use broker::*;
pub use broker_code::*;
pub use commission::*;
pub use ledger::*;
pub use listing::*;
pub use money::*;
pub use verification::*;
pub use withdrawal::*;
