//! Request-shaped surface over a shared [`World`].
//!
//! Every call first acquires the world lock within the configured deadline;
//! a call that cannot get the lock in time fails with `deadline-exceeded`
//! and has changed nothing. Once the lock is held the call runs to the end.
//! Calls on behalf of a player resolve the caller through the
//! [`Authenticator`] and check city ownership before touching anything.

mod admin;
mod army;
mod city;
mod definitions;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

pub use admin::RegionSummary;
pub use army::OrderAck;

use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::model::World;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Longest wait for the world lock.
    pub deadline: Duration,
    /// Upper bound of every listing.
    pub page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            page_size: 100,
        }
    }
}

/// Who is calling: a user playing one of their characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user: u64,
    pub character: u64,
}

impl Caller {
    pub fn new(user: u64, character: u64) -> Self {
        Self { user, character }
    }
}

#[derive(Clone)]
pub struct Service {
    world: Arc<RwLock<World>>,
    auth: Arc<dyn Authenticator>,
    config: ServiceConfig,
}

impl Service {
    pub fn new(world: Arc<RwLock<World>>, auth: Arc<dyn Authenticator>, config: ServiceConfig) -> Self {
        Self { world, auth, config }
    }

    pub fn world(&self) -> &Arc<RwLock<World>> {
        &self.world
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, World>> {
        tokio::time::timeout(self.config.deadline, self.world.read())
            .await
            .map_err(|_| Error::DeadlineExceeded)
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, World>> {
        tokio::time::timeout(self.config.deadline, self.world.write())
            .await
            .map_err(|_| Error::DeadlineExceeded)
    }

    /// Character id of the caller, once the authenticator vouched for it
    /// in `region`.
    fn character(&self, caller: Caller, region: &str) -> Result<u64> {
        let session = self.auth.character(caller.user, caller.character)?;
        if !session.region.is_empty() && session.region != region {
            return Err(Error::PermissionDenied(format!(
                "character {} does not play in region '{region}'",
                caller.character
            )));
        }
        debug!(user = caller.user, character = caller.character, region, "caller resolved");
        Ok(session.character)
    }

    /// `max` bounded by the page size; 0 asks for a full page.
    fn page(&self, max: usize) -> usize {
        if max == 0 {
            self.config.page_size
        } else {
            max.min(self.config.page_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TrustingAuthenticator;
    use crate::error::ErrorKind;
    use crate::graph::MapRepository;
    use crate::model::{Configuration, Definitions};
    use crate::notify::NoopNotifier;

    fn service(deadline: Duration) -> Service {
        let world = World::new(
            Configuration::default(),
            Definitions::default(),
            Arc::new(MapRepository::new()),
            Arc::new(NoopNotifier),
        );
        Service::new(
            Arc::new(RwLock::new(world)),
            Arc::new(TrustingAuthenticator),
            ServiceConfig {
                deadline,
                page_size: 10,
            },
        )
    }

    #[tokio::test]
    async fn lock_wait_is_bounded() {
        let svc = service(Duration::from_millis(20));
        let _held = svc.world().write().await;
        let err = svc.list_regions("", 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn page_is_capped() {
        let svc = service(Duration::from_secs(1));
        assert_eq!(svc.page(0), 10);
        assert_eq!(svc.page(3), 3);
        assert_eq!(svc.page(50), 10);
    }
}
