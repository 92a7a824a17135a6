//! Map graphs and the routing collaborators the engine consumes.

pub mod cache;
pub mod map;
pub mod repository;

use std::sync::Arc;

pub use cache::CachingResolver;
pub use map::{Map, Road, Vertex};
pub use repository::MapRepository;

use crate::error::Result;

/// Next-hop lookups on a named map. Must be side-effect free and safe to call
/// from several threads.
pub trait PathResolver: Send + Sync {
    /// First hop on a shortest path from `src` to `dst`.
    ///
    /// Fails with `not-found` for an unknown map and `no-route` when `dst`
    /// is unreachable.
    fn step(&self, map: &str, src: u64, dst: u64) -> Result<u64>;
}

/// What a world needs to know about maps besides routing.
pub trait MapView: PathResolver {
    fn map_has(&self, map: &str) -> bool;

    fn cell_has(&self, map: &str, cell: u64) -> bool;

    /// `(vertex, city name)` for every labelled vertex of the map.
    fn seed_cities(&self, map: &str) -> Result<Vec<(u64, String)>>;
}

impl<T: PathResolver + ?Sized> PathResolver for Arc<T> {
    fn step(&self, map: &str, src: u64, dst: u64) -> Result<u64> {
        (**self).step(map, src, dst)
    }
}

impl<T: MapView + ?Sized> MapView for Arc<T> {
    fn map_has(&self, map: &str) -> bool {
        (**self).map_has(map)
    }

    fn cell_has(&self, map: &str, cell: u64) -> bool {
        (**self).cell_has(map, cell)
    }

    fn seed_cities(&self, map: &str) -> Result<Vec<(u64, String)>> {
        (**self).seed_cities(map)
    }
}
