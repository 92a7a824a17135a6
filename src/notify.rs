//! Best-effort event delivery to the characters running a city.
//!
//! The engine builds notifications through the per-subject builders on
//! `dyn Notifier` and never waits on delivery. Losses are logged.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    ArmyMoved { army: String, src: u64, dst: u64 },
    ArmyNoRoute { army: String, src: u64, dst: u64 },
    KnowledgeStep { knowledge: String, step: u32, max: u32 },
    UnitsStep { unit: String, step: u32, max: u32 },
}

/// An event addressed to one city of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub region: String,
    pub city: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Sink for notifications. `notify` must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl dyn Notifier + '_ {
    pub fn army<'a>(&'a self, region: &'a str, city: u64) -> ArmyNotice<'a> {
        ArmyNotice {
            sink: self,
            region,
            city,
            army: String::new(),
            route: None,
        }
    }

    pub fn knowledge<'a>(&'a self, region: &'a str, city: u64) -> StepNotice<'a> {
        StepNotice::new(self, region, city, StepSubject::Knowledge)
    }

    pub fn units<'a>(&'a self, region: &'a str, city: u64) -> StepNotice<'a> {
        StepNotice::new(self, region, city, StepSubject::Units)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Route {
    Moved(u64, u64),
    NoRoute(u64, u64),
}

#[must_use = "a notice does nothing until sent"]
pub struct ArmyNotice<'a> {
    sink: &'a dyn Notifier,
    region: &'a str,
    city: u64,
    army: String,
    route: Option<Route>,
}

impl ArmyNotice<'_> {
    pub fn item(mut self, army: &str) -> Self {
        self.army = army.to_string();
        self
    }

    pub fn moved(mut self, src: u64, dst: u64) -> Self {
        self.route = Some(Route::Moved(src, dst));
        self
    }

    pub fn no_route(mut self, src: u64, dst: u64) -> Self {
        self.route = Some(Route::NoRoute(src, dst));
        self
    }

    pub fn send(self) {
        let event = match self.route {
            Some(Route::Moved(src, dst)) => Event::ArmyMoved {
                army: self.army,
                src,
                dst,
            },
            Some(Route::NoRoute(src, dst)) => Event::ArmyNoRoute {
                army: self.army,
                src,
                dst,
            },
            None => {
                warn!(region = self.region, city = self.city, "army notice without event dropped");
                return;
            }
        };
        self.sink.notify(Notification {
            region: self.region.to_string(),
            city: self.city,
            event,
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum StepSubject {
    Knowledge,
    Units,
}

#[must_use = "a notice does nothing until sent"]
pub struct StepNotice<'a> {
    sink: &'a dyn Notifier,
    region: &'a str,
    city: u64,
    subject: StepSubject,
    item: String,
    step: u32,
    max: u32,
}

impl<'a> StepNotice<'a> {
    fn new(sink: &'a dyn Notifier, region: &'a str, city: u64, subject: StepSubject) -> Self {
        Self {
            sink,
            region,
            city,
            subject,
            item: String::new(),
            step: 0,
            max: 0,
        }
    }

    pub fn item(mut self, id: &str) -> Self {
        self.item = id.to_string();
        self
    }

    pub fn step(mut self, step: u32, max: u32) -> Self {
        self.step = step;
        self.max = max;
        self
    }

    pub fn send(self) {
        let event = match self.subject {
            StepSubject::Knowledge => Event::KnowledgeStep {
                knowledge: self.item,
                step: self.step,
                max: self.max,
            },
            StepSubject::Units => Event::UnitsStep {
                unit: self.item,
                step: self.step,
                max: self.max,
            },
        };
        self.sink.notify(Notification {
            region: self.region.to_string(),
            city: self.city,
            event,
        });
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Logs every notification at `info`, then forwards it.
#[derive(Debug, Default)]
pub struct LogNotifier<N> {
    inner: N,
}

impl<N: Notifier> LogNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: Notifier> Notifier for LogNotifier<N> {
    fn notify(&self, n: Notification) {
        match &n.event {
            Event::ArmyMoved { army, src, dst } => {
                info!(region = %n.region, city = n.city, army = %army, src, dst, "army moved")
            }
            Event::ArmyNoRoute { army, src, dst } => {
                info!(region = %n.region, city = n.city, army = %army, src, dst, "army has no route")
            }
            Event::KnowledgeStep {
                knowledge,
                step,
                max,
            } => info!(region = %n.region, city = n.city, knowledge = %knowledge, step, max, "knowledge step"),
            Event::UnitsStep { unit, step, max } => {
                info!(region = %n.region, city = n.city, unit = %unit, step, max, "units step")
            }
        }
        self.inner.notify(n);
    }
}

/// Keeps everything in memory. Used by tests and tools.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, leaving the log empty.
    pub fn take(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(_) => warn!("memory notifier poisoned, notification dropped"),
        }
    }
}

/// Forwards into a bounded tokio channel without waiting. A full or closed
/// channel drops the notification with a warning.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.tx.try_send(notification) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            warn!(reason, "notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn builders_produce_events() {
        let memory = MemoryNotifier::new();
        let sink: &dyn Notifier = &memory;
        sink.army("north", 3).item("a1").moved(3, 4).send();
        sink.army("north", 3).item("a1").no_route(4, 9).send();
        sink.knowledge("north", 3).item("k1").step(1, 4).send();
        sink.units("north", 5).item("u1").step(2, 2).send();
        // incomplete notices are dropped
        sink.army("north", 3).item("a1").send();

        let sent = memory.take();
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0].event,
            Event::ArmyMoved {
                army: "a1".into(),
                src: 3,
                dst: 4
            }
        );
        assert!(matches!(sent[1].event, Event::ArmyNoRoute { dst: 9, .. }));
        assert!(matches!(sent[2].event, Event::KnowledgeStep { step: 1, max: 4, .. }));
        assert_eq!(sent[3].city, 5);
        assert!(memory.take().is_empty());
    }

    #[test]
    fn log_notifier_forwards() {
        let log = LogNotifier::new(MemoryNotifier::new());
        let sink: &dyn Notifier = &log;
        sink.units("r", 1).item("u").step(1, 1).send();
        assert_eq!(log.inner.snapshot().len(), 1);
    }

    #[test]
    fn notifications_serialize_flat() {
        let n = Notification {
            region: "r".into(),
            city: 2,
            event: Event::ArmyNoRoute {
                army: "a".into(),
                src: 1,
                dst: 3,
            },
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["event"], "army-no-route");
        assert_eq!(json["city"], 2);
        assert_eq!(json["dst"], 3);
    }

    #[tokio::test]
    async fn channel_notifier_drops_when_full() {
        let (notifier, mut rx) = ChannelNotifier::new(1);
        let sink: Arc<dyn Notifier> = Arc::new(notifier);
        sink.units("r", 1).item("a").step(1, 2).send();
        sink.units("r", 1).item("b").step(1, 2).send();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first.event, Event::UnitsStep { ref unit, .. } if unit == "a"));
        assert!(rx.try_recv().is_err());
    }
}
