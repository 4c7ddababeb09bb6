use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use saga_core::Clock;
use saga_status::SagaStatus;
use saga_runtime::notify_once::NotifyOnce;
use saga_runtime::task::Task;
use tracing::debug;
use uuid::Uuid;

use crate::slot::{LiveSubscription, Slot};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct LiveStatusBusConfig {
    /// A slot with zero subscribers untouched for this long is evicted.
    pub idle_ttl: Duration,
    /// How often the opportunistic sweep also runs on a fixed schedule.
    pub sweep_interval: Duration,
}

impl Default for LiveStatusBusConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// An in-process fan-out that gives HTTP clients a live stream of status
/// transitions per saga id (`spec.md` §4.5). Publishers never block on
/// subscriber backpressure — a slow or vanished subscriber's broadcast
/// channel just drops the message.
pub struct LiveStatusBus {
    slots: Mutex<HashMap<Uuid, Arc<Slot>>>,
    clock: Arc<dyn Clock>,
    config: LiveStatusBusConfig,
}

impl LiveStatusBus {
    pub fn new(clock: Arc<dyn Clock>, config: LiveStatusBusConfig) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            config,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    fn get_or_create_slot(&self, id: Uuid) -> Arc<Slot> {
        let now_ms = self.now_ms();
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(id)
            .or_insert_with(|| Arc::new(Slot::new(DEFAULT_CHANNEL_CAPACITY, now_ms)))
            .clone()
    }

    /// Delivers `status` to all current subscribers of `status.id` and
    /// retains it for late subscribers. Transparently (re-)creates the slot
    /// if it was previously evicted or completed (`spec.md` §4.5: "A
    /// publish that arrives after termination MUST transparently create a
    /// fresh slot").
    pub fn publish(&self, status: SagaStatus) {
        let slot = self.get_or_create_slot(status.id);
        let now_ms = self.now_ms();
        *slot.latest.lock().unwrap() = Some(status.clone());
        slot.touch(now_ms);
        let _ = slot.tx.send(status);
        self.sweep_once();
    }

    /// Subscribes to `id`'s status transitions. The latest retained value
    /// (if any) is delivered first, then live updates.
    pub fn subscribe(&self, id: Uuid) -> LiveSubscription {
        let slot = self.get_or_create_slot(id);
        slot.subscriber_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        slot.touch(self.now_ms());
        let receiver = slot.tx.subscribe();
        let first = slot.latest.lock().unwrap().clone();
        LiveSubscription {
            first,
            receiver,
            slot,
        }
    }

    /// Terminates `id`'s stream: any subscriber still holding a receiver
    /// observes the channel close, and the slot becomes eligible for
    /// eviction immediately (`spec.md` §4.5: "complete(id)").
    pub fn complete(&self, id: Uuid) {
        self.slots.lock().unwrap().remove(&id);
        self.sweep_once();
    }

    /// Evicts slots with zero subscribers idle beyond `idle_ttl`. Runs
    /// opportunistically from `publish`/`complete`, and can also be driven
    /// by a fixed schedule via [`Self::spawn_eviction_task`].
    pub fn sweep_once(&self) {
        let now_ms = self.now_ms();
        let idle_ttl_ms = self.config.idle_ttl.as_millis() as u64;
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_idle(now_ms, idle_ttl_ms));
        let evicted = before - slots.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle live-status slots");
        }
    }

    /// Spawns the fixed-schedule sweep (`spec.md` §4.5: "on a fixed
    /// schedule (default every 5 minutes)").
    pub fn spawn_eviction_task(self: Arc<Self>, mut shutdown: NotifyOnce) -> Task<()> {
        Task::spawn("live-status-bus-eviction", async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.recv() => break,
                    _ = ticker.tick() => self.sweep_once(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use saga_core::clock::FakeClock;

    fn sample_status(id: Uuid, state: &str) -> SagaStatus {
        SagaStatus {
            id,
            tenant_id: "acme".to_string(),
            user_id: "u-1".to_string(),
            saga_type: "ORDER".to_string(),
            state: state.to_string(),
            reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn late_subscriber_replays_latest_value() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let bus = LiveStatusBus::new(clock, LiveStatusBusConfig::default());
        let id = Uuid::new_v4();

        bus.publish(sample_status(id, "STARTED"));
        let mut sub = bus.subscribe(id);
        let first = sub.next().await.unwrap();
        assert_eq!(first.state, "STARTED");
    }

    #[tokio::test]
    async fn subscriber_sees_publishes_in_order() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let bus = LiveStatusBus::new(clock, LiveStatusBusConfig::default());
        let id = Uuid::new_v4();

        let mut sub = bus.subscribe(id);
        bus.publish(sample_status(id, "STARTED"));
        bus.publish(sample_status(id, "PAID"));

        assert_eq!(sub.next().await.unwrap().state, "STARTED");
        assert_eq!(sub.next().await.unwrap().state, "PAID");
    }

    #[tokio::test]
    async fn idle_slot_with_no_subscribers_is_evicted() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let bus = LiveStatusBus::new(
            clock.clone(),
            LiveStatusBusConfig {
                idle_ttl: Duration::from_secs(60),
                sweep_interval: Duration::from_secs(300),
            },
        );
        let id = Uuid::new_v4();
        bus.publish(sample_status(id, "STARTED"));
        assert_eq!(bus.slots.lock().unwrap().len(), 1);

        clock.advance(chrono::Duration::seconds(61));
        bus.sweep_once();
        assert_eq!(bus.slots.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn publish_after_completion_recreates_the_slot() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let bus = LiveStatusBus::new(clock, LiveStatusBusConfig::default());
        let id = Uuid::new_v4();

        bus.publish(sample_status(id, "STARTED"));
        bus.complete(id);
        assert_eq!(bus.slots.lock().unwrap().len(), 0);

        bus.publish(sample_status(id, "PAID"));
        let mut sub = bus.subscribe(id);
        assert_eq!(sub.next().await.unwrap().state, "PAID");
    }
}
