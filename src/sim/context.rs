use crate::graph::PathResolver;
use crate::model::{Configuration, Definitions};
use crate::notify::Notifier;

/// Everything a round needs besides the region it mutates.
#[derive(Clone, Copy)]
pub struct RoundContext<'a> {
    /// Name of the region being processed, for notifications and logs.
    pub region: &'a str,
    pub defs: &'a Definitions,
    pub config: &'a Configuration,
    pub notifier: &'a dyn Notifier,
    pub resolver: &'a dyn PathResolver,
}
