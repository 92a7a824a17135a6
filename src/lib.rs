//! Regional simulation engine for a persistent, turn-based strategy game.
//!
//! A [`World`] holds immutable definitions, configuration and the registry
//! of [`Region`]s. Each region owns its cities, their armies and the fights
//! running on its map. Rounds (`produce`, `move`) are applied to a whole
//! region at once.

#[macro_use]
pub mod model;

pub mod auth;
pub mod error;
pub mod graph;
pub mod id;
pub mod notify;
pub mod persist;
pub mod service;
pub mod sim;

pub use error::{Error, ErrorKind, Result};
pub use graph::{CachingResolver, Map, MapRepository, MapView, PathResolver};
pub use id::VertexIds;
pub use model::{
    Action, Army, AssaultArgs, City, Command, Configuration, Definitions, Fight, Modifier,
    MoveArgs, Region, Resources, SortedSet, World,
};
pub use notify::{Notification, Notifier};
