//! In-process publish/subscribe topics for the rate data layer.
//!
//! Every subscriber owns an unbounded channel receiver, so handler code runs
//! in whichever task drains it. The topic lock only guards the subscriber
//! list and the enqueueing of values.

use crate::core::currency::{CurrencyList, ExchangeRate};
use crate::core::error::DataError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Sink<T> {
    Stream(mpsc::UnboundedSender<T>),
    Once(oneshot::Sender<T>),
}

struct Subscriber<T> {
    id: u64,
    sink: Sink<T>,
}

struct TopicState<T> {
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
    latest: Option<T>,
}

/// A typed topic. Delivery follows publish order, and within one publish
/// the order in which subscribers registered.
pub struct Topic<T> {
    name: &'static str,
    replay: bool,
    state: Arc<Mutex<TopicState<T>>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            replay: self.replay,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Topic<T>
where
    T: Clone + Send + 'static,
{
    /// Fire-and-forget topic: late subscribers only see later values.
    pub fn broadcast(name: &'static str) -> Self {
        Self::build(name, false, None)
    }

    /// Latest-value topic: each new subscriber first receives the most
    /// recent value, or `initial` if nothing was published yet.
    pub fn latest(name: &'static str, initial: T) -> Self {
        Self::build(name, true, Some(initial))
    }

    fn build(name: &'static str, replay: bool, latest: Option<T>) -> Self {
        Self {
            name,
            replay,
            state: Arc::new(Mutex::new(TopicState {
                next_id: 0,
                subscribers: Vec::new(),
                latest,
            })),
        }
    }

    pub fn publish(&self, value: T) {
        let mut state = self.state.lock();
        debug!(
            topic = self.name,
            subscribers = state.subscribers.len(),
            "Publishing"
        );
        if self.replay {
            state.latest = Some(value.clone());
        }

        let subscribers = std::mem::take(&mut state.subscribers);
        state.subscribers = subscribers
            .into_iter()
            .filter_map(|subscriber| match subscriber.sink {
                Sink::Stream(tx) => tx.send(value.clone()).is_ok().then_some(Subscriber {
                    id: subscriber.id,
                    sink: Sink::Stream(tx),
                }),
                Sink::Once(tx) => {
                    // Receiver may already be gone; either way it is done.
                    let _ = tx.send(value.clone());
                    None
                }
            })
            .collect();
    }

    /// Registers a subscriber that receives every value until it is dropped.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if let Some(latest) = state.latest.as_ref().filter(|_| self.replay) {
            let _ = tx.send(latest.clone());
        }
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(Subscriber {
            id,
            sink: Sink::Stream(tx),
        });
        debug!(topic = self.name, id, "Subscribed");

        Subscription {
            id,
            rx,
            topic: self.clone(),
        }
    }

    /// Registers a single-shot subscriber that resolves with the next value
    /// and then leaves the topic. On a latest-value topic it resolves
    /// immediately with the current value.
    pub fn once(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        if let Some(latest) = state.latest.as_ref().filter(|_| self.replay) {
            let _ = tx.send(latest.clone());
            return rx;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(Subscriber {
            id,
            sink: Sink::Once(tx),
        });
        debug!(topic = self.name, id, "Subscribed once");
        rx
    }

    /// Current value of a latest-value topic.
    pub fn current(&self) -> Option<T> {
        self.state.lock().latest.clone()
    }

    /// Live subscribers, counting single-shot ones still waiting.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|s| match &s.sink {
            Sink::Stream(tx) => !tx.is_closed(),
            Sink::Once(tx) => !tx.is_closed(),
        });
        state.subscribers.len()
    }

    fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|s| s.id != id);
        debug!(topic = self.name, id, "Unsubscribed");
    }
}

/// Handle for a streaming subscription. Dropping it unsubscribes.
pub struct Subscription<T>
where
    T: Clone + Send + 'static,
{
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    topic: Topic<T>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + 'static,
{
    /// Waits for the next value. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Takes an already delivered value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Leaves the topic now. Values already delivered are discarded.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.topic.unsubscribe(self.id);
    }
}

/// Every topic the rate data layer publishes on.
#[derive(Clone)]
pub struct EventBus {
    /// Latest selected currency code, replayed to new subscribers.
    pub selected_currency: Topic<String>,
    /// Any rate table that became available, fetched, cached or derived.
    pub exchange_rate_ready: Topic<ExchangeRate>,
    /// Rate tables of the base currency only.
    pub base_exchange_rate_ready: Topic<ExchangeRate>,
    pub currency_list_ready: Topic<CurrencyList>,
    pub data_error: Topic<DataError>,
}

impl EventBus {
    pub fn new(initial_currency: impl Into<String>) -> Self {
        Self {
            selected_currency: Topic::latest("SelectedCurrencyCode", initial_currency.into()),
            exchange_rate_ready: Topic::broadcast("ExchangeRateReady"),
            base_exchange_rate_ready: Topic::broadcast("BaseExchangeRateReady"),
            currency_list_ready: Topic::broadcast("CurrencyListReady"),
            data_error: Topic::broadcast("DataError"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_in_publish_order() {
        let topic = Topic::<i32>::broadcast("numbers");
        let mut first = topic.subscribe();
        let mut second = topic.subscribe();

        topic.publish(1);
        topic.publish(2);

        assert_eq!(first.recv().await, Some(1));
        assert_eq!(first.recv().await, Some(2));
        assert_eq!(second.recv().await, Some(1));
        assert_eq!(second.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_broadcast_has_no_replay() {
        let topic = Topic::<i32>::broadcast("numbers");
        topic.publish(1);

        let mut late = topic.subscribe();
        assert!(late.try_recv().is_none());

        topic.publish(2);
        assert_eq!(late.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_latest_replays_default_then_last_value() {
        let topic = Topic::latest("selected", "JPY".to_string());
        let mut early = topic.subscribe();
        assert_eq!(early.try_recv().as_deref(), Some("JPY"));

        topic.publish("EUR".to_string());
        topic.publish("GBP".to_string());

        let mut late = topic.subscribe();
        assert_eq!(late.try_recv().as_deref(), Some("GBP"));
        assert!(late.try_recv().is_none());

        assert_eq!(early.recv().await.as_deref(), Some("EUR"));
        assert_eq!(early.recv().await.as_deref(), Some("GBP"));
        assert_eq!(topic.current().as_deref(), Some("GBP"));
    }

    #[tokio::test]
    async fn test_once_receives_only_next_value() {
        let topic = Topic::<i32>::broadcast("numbers");
        let once = topic.once();
        assert_eq!(topic.subscriber_count(), 1);

        topic.publish(7);
        topic.publish(8);

        assert_eq!(once.await.unwrap(), 7);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_subscriber() {
        let topic = Topic::<i32>::broadcast("numbers");
        let subscription = topic.subscribe();
        let _kept = topic.subscribe();
        assert_eq!(topic.subscriber_count(), 2);

        subscription.unsubscribe();
        assert_eq!(topic.subscriber_count(), 1);

        // Publishing after a dropped single-shot receiver is harmless.
        drop(topic.once());
        topic.publish(1);
        assert_eq!(topic.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_from_another_task_while_publishing() {
        let topic = Topic::<usize>::broadcast("numbers");
        let mut subscription = topic.subscribe();

        let publisher = {
            let topic = topic.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    topic.publish(i);
                    tokio::task::yield_now().await;
                }
            })
        };
        let joiner = {
            let topic = topic.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let late = topic.subscribe();
                    tokio::task::yield_now().await;
                    drop(late);
                }
            })
        };
        publisher.await.unwrap();
        joiner.await.unwrap();

        for expected in 0..100 {
            assert_eq!(subscription.recv().await, Some(expected));
        }
    }
}
