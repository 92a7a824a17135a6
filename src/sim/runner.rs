use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::World;
use crate::persist::save_world;

/// The two whole-region operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    Produce,
    Move,
}

string_enum!(Round {
    Produce => "produce",
    Move => "move",
});

/// Configuration for a serving run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Period of production rounds; `None` disables them.
    pub produce_every: Option<Duration>,
    /// Period of movement rounds; `None` disables them.
    pub move_every: Option<Duration>,
    /// If set, the world is saved there on shutdown.
    pub save_dir: Option<PathBuf>,
}

/// Apply `round` to every region in name order. A region failing the round
/// is logged and skipped. Returns how many regions completed.
pub fn dispatch_round(world: &mut World, round: Round) -> usize {
    let names: Vec<String> = world.regions.keys().cloned().collect();
    let mut done = 0;
    for name in &names {
        let outcome = match round {
            Round::Produce => world.produce(name),
            Round::Move => world.move_armies(name),
        };
        match outcome {
            Ok(()) => done += 1,
            Err(err) => warn!(region = %name, round = %round, error = %err, "round failed"),
        }
    }
    debug!(round = %round, regions = done, "round dispatched");
    done
}

fn ticker(period: Option<Duration>) -> Option<Interval> {
    let period = period.filter(|p| !p.is_zero())?;
    // the first tick of an interval fires immediately; rounds start one
    // period after startup
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Serve rounds until `shutdown` resolves, then save.
///
/// A round holds the world's write lock from start to end and is never
/// interrupted: shutdown is only observed between rounds.
pub async fn run(world: Arc<RwLock<World>>, config: RunConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
    let mut produce = ticker(config.produce_every);
    let mut movement = ticker(config.move_every);
    tokio::pin!(shutdown);
    info!(
        produce_every = ?config.produce_every,
        move_every = ?config.move_every,
        "serving rounds"
    );
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick(&mut produce) => {
                dispatch_round(&mut *world.write().await, Round::Produce);
            }
            _ = tick(&mut movement) => {
                dispatch_round(&mut *world.write().await, Round::Move);
            }
        }
    }
    info!("shutting down");
    if let Some(dir) = &config.save_dir {
        save_world(&*world.read().await, dir)?;
    }
    Ok(())
}
