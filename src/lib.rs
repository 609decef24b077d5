pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod money;

pub use config::BankConfig;
pub use engine::{EngineError, Guild, SharedGuild};
pub use model::{Command, Endpoint, ItemId, MemberId, MoveRequest, SlotId, TabId};
pub use money::Money;
