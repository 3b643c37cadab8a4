// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/*
 * Bountyy Oy - Event Bus
 * Topic-keyed publish/subscribe with bounded concurrent fan-out
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

//! Decouples discovery producers from consumers. Publishing never blocks the
//! caller; a single dispatch task drains the publish queue in FIFO order and
//! fans each request out to the subscribers registered for its topic at
//! dispatch time. A bus-wide semaphore bounds the number of concurrently
//! executing callback sets.
//!
//! Delivery is at-least-once, best-effort: the bus never drops an accepted
//! publish, and it makes no ordering promises across topics or between
//! subscribers of the same topic once dispatched.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, warn};

/// Ceiling on concurrently executing callback sets. Effectively unbounded,
/// but finite so pathological fan-out cannot explode the task count.
const MAX_CONCURRENT_DISPATCH: usize = 1_000_000;

/// Payloads travel type-erased and shared. Subscribers never mutate a
/// payload; multiple callbacks may run concurrently over the same value.
pub type Payload = Arc<dyn Any + Send + Sync>;

type HandlerFn = dyn Fn(&Payload) + Send + Sync;

/// A statically typed subscriber callback wrapped for transport on the bus.
///
/// The wrapper downcasts each payload to the type registered for it; a
/// payload of any other concrete type is a caller programming error and the
/// invocation is skipped. Clones share identity: `unsubscribe` removes every
/// registration whose wrapped callback is pointer-equal to the one given.
#[derive(Clone)]
pub struct EventHandler(Arc<HandlerFn>);

impl EventHandler {
    pub fn new<T, F>(callback: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        EventHandler(Arc::new(move |payload: &Payload| {
            match Arc::clone(payload).downcast::<T>() {
                Ok(typed) => callback(typed),
                Err(_) => debug!("event payload type mismatch, skipping subscriber"),
            }
        }))
    }

    fn call(&self, payload: &Payload) {
        (self.0)(payload)
    }

    fn same_identity(&self, other: &EventHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct PublishRequest {
    topic: String,
    payload: Payload,
}

type TopicMap = Arc<Mutex<HashMap<String, Vec<EventHandler>>>>;

/// Handles sending and receiving events across Luotain.
pub struct EventBus {
    topics: TopicMap,
    queue: mpsc::UnboundedSender<PublishRequest>,
    done: watch::Sender<bool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create the bus and spawn its dispatch task. Requires a tokio runtime.
    pub fn new() -> Self {
        Self::with_max_dispatch(MAX_CONCURRENT_DISPATCH)
    }

    pub fn with_max_dispatch(permits: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);
        let topics: TopicMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(dispatch_loop(
            Arc::clone(&topics),
            queue_rx,
            done_rx,
            Arc::new(Semaphore::new(permits)),
        ));

        Self {
            topics,
            queue: queue_tx,
            done: done_tx,
        }
    }

    /// Register `handler` for all publishes on `topic`. No-op for an empty
    /// topic. Not idempotent: subscribing the same handler twice yields two
    /// invocations per publish.
    pub fn subscribe(&self, topic: &str, handler: &EventHandler) {
        if topic.is_empty() {
            return;
        }
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(handler.clone());
    }

    /// Remove all registrations of `handler` on `topic`, matched by
    /// identity. No-op if not found. A handler removed mid-dispatch may
    /// still receive one in-flight invocation.
    pub fn unsubscribe(&self, topic: &str, handler: &EventHandler) {
        if topic.is_empty() {
            return;
        }
        let mut topics = self.topics.lock();
        if let Some(handlers) = topics.get_mut(topic) {
            handlers.retain(|h| !h.same_identity(handler));
        }
    }

    /// Queue `payload` for delivery to every subscriber of `topic` as of
    /// dispatch time. Returns immediately regardless of queue depth or
    /// subscriber count. No-op for an empty topic.
    pub fn publish<T: Any + Send + Sync>(&self, topic: &str, payload: T) {
        self.publish_shared(topic, Arc::new(payload));
    }

    /// `publish` for a payload that is already shared.
    pub fn publish_shared(&self, topic: &str, payload: Payload) {
        if topic.is_empty() {
            return;
        }
        // The send only fails once the dispatch loop has exited; publishes
        // after stop() are discarded.
        let _ = self.queue.send(PublishRequest {
            topic: topic.to_string(),
            payload,
        });
    }

    /// Number of handlers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, |handlers| handlers.len())
    }

    /// Signal the dispatch task to terminate after its current queue cycle.
    /// In-flight callback invocations are neither awaited nor cancelled.
    pub fn stop(&self) {
        let _ = self.done.send(true);
    }
}

async fn dispatch_loop(
    topics: TopicMap,
    mut queue: mpsc::UnboundedReceiver<PublishRequest>,
    mut done: watch::Receiver<bool>,
    permits: Arc<Semaphore>,
) {
    loop {
        let req = tokio::select! {
            _ = done.changed() => return,
            next = queue.recv() => match next {
                Some(req) => req,
                // All senders gone: the bus itself was dropped.
                None => return,
            },
        };

        // Snapshot the subscriber list under a short critical section.
        // Subscribers added after this point miss this publish.
        let handlers: Vec<EventHandler> = topics
            .lock()
            .get(&req.topic)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            continue;
        }

        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        tokio::spawn(async move {
            let _permit = permit;
            for handler in &handlers {
                // A panicking subscriber must not take down its siblings.
                if catch_unwind(AssertUnwindSafe(|| handler.call(&req.payload))).is_err() {
                    warn!(topic = %req.topic, "subscriber panicked during event delivery");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::time::sleep;

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        EventHandler::new::<String, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_exactly_once() {
        let bus = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let h1 = counting_handler(Arc::clone(&first));
        let h2 = counting_handler(Arc::clone(&second));
        bus.subscribe("test:topic", &h1);
        bus.subscribe("test:topic", &h2);

        bus.publish("test:topic", "hello".to_string());
        sleep(Duration::from_millis(50)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        bus.stop();
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_publish() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.publish("test:topic", "early".to_string());
        sleep(Duration::from_millis(50)).await;

        let handler = counting_handler(Arc::clone(&counter));
        bus.subscribe("test:topic", &handler);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus.publish("test:topic", "late".to_string());
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        bus.stop();
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&counter));

        bus.subscribe("test:topic", &handler);
        bus.unsubscribe("test:topic", &handler);
        assert_eq!(bus.subscriber_count("test:topic"), 0);

        bus.publish("test:topic", "a".to_string());
        bus.publish("test:topic", "b".to_string());
        sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        bus.stop();
    }

    #[tokio::test]
    async fn test_double_subscribe_invokes_twice() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&counter));

        bus.subscribe("test:topic", &handler);
        bus.subscribe("test:topic", &handler);

        bus.publish("test:topic", "x".to_string());
        sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // Identity-matched removal takes out both registrations.
        bus.unsubscribe("test:topic", &handler);
        assert_eq!(bus.subscriber_count("test:topic"), 0);
        bus.stop();
    }

    #[tokio::test]
    async fn test_publish_never_blocks() {
        let bus = EventBus::new();

        // Slow subscribers must not slow the publisher down.
        for _ in 0..16 {
            let handler = EventHandler::new::<String, _>(move |_| {
                std::thread::sleep(Duration::from_millis(20));
            });
            bus.subscribe("test:topic", &handler);
        }

        let start = Instant::now();
        for i in 0..1000 {
            bus.publish("test:topic", format!("msg-{}", i));
        }
        assert!(start.elapsed() < Duration::from_millis(500));
        bus.stop();
    }

    #[tokio::test]
    async fn test_empty_topic_is_noop() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&counter));

        bus.subscribe("", &handler);
        assert_eq!(bus.subscriber_count(""), 0);
        bus.publish("", "x".to_string());
        sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        bus.stop();
    }

    #[tokio::test]
    async fn test_payload_type_mismatch_is_skipped() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&counter));
        bus.subscribe("test:topic", &handler);

        bus.publish("test:topic", 42u32);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus.publish("test:topic", "typed".to_string());
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        bus.stop();
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let panicking = EventHandler::new::<String, _>(|_| panic!("subscriber bug"));
        let healthy = counting_handler(Arc::clone(&counter));
        bus.subscribe("test:topic", &panicking);
        bus.subscribe("test:topic", &healthy);

        bus.publish("test:topic", "a".to_string());
        bus.publish("test:topic", "b".to_string());
        sleep(Duration::from_millis(100)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        bus.stop();
    }

    #[tokio::test]
    async fn test_stop_halts_future_dispatch() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&counter));
        bus.subscribe("test:topic", &handler);

        bus.stop();
        sleep(Duration::from_millis(30)).await;

        bus.publish("test:topic", "after-stop".to_string());
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_accepted_publish_is_dropped() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        let handler = EventHandler::new::<usize, _>(move |n| {
            sink.lock().push(*n);
        });
        bus.subscribe("test:topic", &handler);

        for i in 0..100usize {
            bus.publish("test:topic", i);
        }
        sleep(Duration::from_millis(200)).await;

        let seen = received.lock().clone();
        assert_eq!(seen.len(), 100);
        bus.stop();
    }
}
