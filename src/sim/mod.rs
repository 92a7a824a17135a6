//! Round orchestration: the context handed to a round and the timer loop
//! that fires rounds on a live world.

mod context;
mod runner;

pub use context::RoundContext;
pub use runner::{Round, RunConfig, dispatch_round, run};
