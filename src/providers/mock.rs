//! Scripted provider for tests

use super::{Candle, PriceProvider, ProviderError};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted reply; the last reply for a symbol repeats forever
#[derive(Debug, Clone)]
pub enum MockReply {
    Closes(Vec<f64>),
    NotFound,
    Unavailable,
    Forbidden,
    Garbled,
    Delayed(Duration, Vec<f64>),
    Hang,
    Panic,
}

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, symbol: &str, replies: Vec<MockReply>) {
        self.replies
            .lock()
            .insert(symbol.to_string(), replies.into_iter().collect());
    }

    pub fn calls(&self, symbol: &str) -> usize {
        self.calls.lock().get(symbol).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, symbol: &str) -> MockReply {
        *self.calls.lock().entry(symbol.to_string()).or_default() += 1;
        let mut replies = self.replies.lock();
        match replies.get_mut(symbol) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(MockReply::NotFound),
            Some(queue) => queue.front().cloned().unwrap_or(MockReply::NotFound),
            None => MockReply::NotFound,
        }
    }
}

pub fn candles(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2026, 10, 14, 4, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Candle::from_close(start + ChronoDuration::minutes(5 * i as i64), *close))
        .collect()
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _range: &str,
        _interval: &str,
    ) -> Result<Vec<Candle>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.next_reply(symbol) {
            MockReply::Closes(closes) => Ok(candles(&closes)),
            MockReply::NotFound => Err(ProviderError::NotFound(symbol.to_string())),
            MockReply::Unavailable => Err(ProviderError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
            MockReply::Forbidden => Err(ProviderError::Status {
                status: 403,
                message: "Forbidden".to_string(),
            }),
            MockReply::Garbled => Err(ProviderError::Decode("truncated body".to_string())),
            MockReply::Delayed(delay, closes) => {
                tokio::time::sleep(delay).await;
                Ok(candles(&closes))
            }
            MockReply::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            MockReply::Panic => panic!("scripted provider panic for {}", symbol),
        }
    }
}
