//! Throttled, freshness-aware cache of the current reading
//!
//! Dashboard widgets poll on their own timers, often several at once. The
//! poller serves them from a cached `(label, reading)` pair and only goes to
//! the remote store once per polling interval. The throttle check, the fetch,
//! the classification and the cache write form one critical section.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::PostureClassifier;
use crate::config::PipelineConfig;
use crate::error::ChairError;
use crate::store::{day_key, parse_entry, RemoteStore, StoreLayout};
use crate::types::{Posture, TimestampedReading};

/// Entries fetched per poll; the newest usable one wins
pub const RECENT_ENTRIES: usize = 5;

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Label and reading served to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentReading {
    pub label: Posture,
    /// `None` when nobody is sitting (no fresh row)
    pub reading: Option<TimestampedReading>,
}

impl CurrentReading {
    pub fn not_sitting() -> Self {
        Self {
            label: Posture::NotSitting,
            reading: None,
        }
    }
}

/// Mutable cache owned by one poller
#[derive(Debug, Clone)]
pub struct CacheState {
    pub last_poll: Option<DateTime<Utc>>,
    pub last_reading: Option<TimestampedReading>,
    pub last_label: Posture,
    pub polling_interval: Duration,
}

impl CacheState {
    fn new(polling_interval: Duration) -> Self {
        Self {
            last_poll: None,
            last_reading: None,
            last_label: Posture::NotSitting,
            polling_interval,
        }
    }

    fn is_throttled(&self, now: DateTime<Utc>) -> bool {
        self.last_poll
            .map(|last| now - last < self.polling_interval)
            .unwrap_or(false)
    }

    fn snapshot(&self) -> CurrentReading {
        CurrentReading {
            label: self.last_label,
            reading: self.last_reading.clone(),
        }
    }
}

/// Poller for the current reading and its classification
pub struct CurrentReadingPoller {
    store: Arc<dyn RemoteStore>,
    classifier: Arc<dyn PostureClassifier>,
    clock: Arc<dyn Clock>,
    layout: StoreLayout,
    utc_offset: FixedOffset,
    freshness_threshold: Duration,
    state: Mutex<CacheState>,
}

impl CurrentReadingPoller {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        classifier: Arc<dyn PostureClassifier>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Result<Self, ChairError> {
        Ok(Self {
            store,
            classifier,
            clock,
            layout: config.layout,
            utc_offset: config.utc_offset()?,
            freshness_threshold: config.freshness_threshold(),
            state: Mutex::new(CacheState::new(config.polling_interval())),
        })
    }

    /// Current posture label and reading.
    ///
    /// Returns the cached pair while inside the polling interval. Otherwise
    /// fetches the last few entries of today's bucket and takes the newest
    /// one that decodes to an in-range row; a missing or stale row yields
    /// `Not Sitting` with no reading. Store and classifier failures propagate
    /// and leave the cache untouched.
    pub fn current_reading(&self) -> Result<CurrentReading, ChairError> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        if state.is_throttled(now) {
            debug!("poll throttled, serving cached reading");
            return Ok(state.snapshot());
        }

        let day = day_key(now, self.utc_offset);
        let entries = self.store.fetch_recent(&day, RECENT_ENTRIES)?;
        let row = entries
            .iter()
            .rev()
            .find_map(|(key, value)| match parse_entry(self.layout, key, value) {
                Ok(row) => row,
                Err(e) => {
                    warn!(%key, error = %e, "skipping unusable entry");
                    None
                }
            });

        match row {
            Some(reading) if now - reading.timestamp <= self.freshness_threshold => {
                let label = self.classifier.predict(&reading.channels)?;
                if label != state.last_label {
                    info!(%label, "posture changed");
                }
                state.last_label = label;
                state.last_reading = Some(reading);
            }
            Some(reading) => {
                debug!(
                    age_ms = (now - reading.timestamp).num_milliseconds(),
                    "latest reading is stale"
                );
                state.last_label = Posture::NotSitting;
                state.last_reading = None;
            }
            None => {
                debug!(%day, "no reading for today");
                state.last_label = Posture::NotSitting;
                state.last_reading = None;
            }
        }

        state.last_poll = Some(now);
        Ok(state.snapshot())
    }

    /// Cached pair without touching the store
    pub fn cached(&self) -> CurrentReading {
        self.state.lock().snapshot()
    }

    /// Copy of the whole cache state
    pub fn state(&self) -> CacheState {
        self.state.lock().clone()
    }

    pub fn set_polling_interval(&self, interval: Duration) {
        self.state.lock().polling_interval = interval;
    }

    /// Forget the last poll so the next call goes to the store
    pub fn invalidate(&self) {
        self.state.lock().last_poll = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TemplateClassifier;
    use crate::codec::encode_pressure;
    use crate::store::{DayBucket, MemoryStore};
    use chrono::TimeZone;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper counting remote fetches
    struct CountingStore {
        inner: MemoryStore,
        fetches: AtomicUsize,
    }

    impl RemoteStore for CountingStore {
        fn fetch_day(&self, day: &str) -> Result<Option<DayBucket>, ChairError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_day(day)
        }

        fn list_days(&self) -> Result<Vec<String>, ChairError> {
            self.inner.list_days()
        }

        fn fetch_recent(&self, day: &str, n: usize) -> Result<Vec<(String, Value)>, ChairError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_recent(day, n)
        }
    }

    struct FailingStore;

    impl RemoteStore for FailingStore {
        fn fetch_day(&self, _day: &str) -> Result<Option<DayBucket>, ChairError> {
            Err(ChairError::Store("unreachable".to_string()))
        }

        fn list_days(&self) -> Result<Vec<String>, ChairError> {
            Err(ChairError::Store("unreachable".to_string()))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn store_with(at: DateTime<Utc>, channels: [u16; 12]) -> Arc<CountingStore> {
        let inner = MemoryStore::new();
        inner.insert(
            "2024-01-15",
            at.timestamp_millis().to_string(),
            Value::String(encode_pressure(&channels).unwrap()),
        );
        Arc::new(CountingStore {
            inner,
            fetches: AtomicUsize::new(0),
        })
    }

    fn poller(store: Arc<dyn RemoteStore>, clock: Arc<ManualClock>) -> CurrentReadingPoller {
        CurrentReadingPoller::new(
            store,
            Arc::new(TemplateClassifier::default()),
            clock,
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_reading_is_classified() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start() - Duration::milliseconds(300), [1500; 12]);
        let poller = poller(store, clock);

        let current = poller.current_reading().unwrap();
        assert_eq!(current.label, Posture::SittingCorrectly);
        assert_eq!(current.reading.unwrap().channels, [1500; 12]);
    }

    #[test]
    fn test_throttle_prevents_second_fetch() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start(), [1500; 12]);
        let poller = poller(store.clone(), clock.clone());

        let first = poller.current_reading().unwrap();
        clock.advance(Duration::milliseconds(499));
        let second = poller.current_reading().unwrap();

        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        clock.advance(Duration::milliseconds(1));
        poller.current_reading().unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_throttle_also_applies_when_not_sitting() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            fetches: AtomicUsize::new(0),
        });
        let poller = poller(store.clone(), clock.clone());

        assert_eq!(poller.current_reading().unwrap(), CurrentReading::not_sitting());
        clock.advance(Duration::milliseconds(100));
        assert_eq!(poller.current_reading().unwrap(), CurrentReading::not_sitting());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unusable_newest_entry_falls_back_to_previous_row() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start() - Duration::milliseconds(500), [1500; 12]);
        // Two truncated frames, both newer than the good row
        for (age_ms, frame) in [(200, "~P"), (0, "~PAAAB")] {
            store.inner.insert(
                "2024-01-15",
                (start() - Duration::milliseconds(age_ms)).timestamp_millis().to_string(),
                Value::String(frame.to_string()),
            );
        }
        let poller = poller(store.clone(), clock);

        let current = poller.current_reading().unwrap();
        assert_eq!(current.label, Posture::SittingCorrectly);
        assert_eq!(
            current.reading.unwrap().timestamp,
            start() - Duration::milliseconds(500)
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_newest_row_is_skipped() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = MemoryStore::new();
        for (age_ms, text) in [
            (400, "P1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;"),
            (0, "P4096;0;0;0;0;0;0;0;0;0;0;0;"),
        ] {
            store.insert(
                "2024-01-15",
                (start() - Duration::milliseconds(age_ms)).timestamp_millis().to_string(),
                Value::String(text.to_string()),
            );
        }
        let config = PipelineConfig {
            layout: StoreLayout::Delimited,
            ..PipelineConfig::default()
        };
        let poller = CurrentReadingPoller::new(
            Arc::new(store),
            Arc::new(TemplateClassifier::default()),
            clock,
            &config,
        )
        .unwrap();

        let current = poller.current_reading().unwrap();
        assert_eq!(current.label, Posture::SittingCorrectly);
        assert_eq!(current.reading.unwrap().channels, [1500; 12]);
    }

    #[test]
    fn test_stale_reading_means_not_sitting() {
        let clock = Arc::new(ManualClock::new(start()));
        // Strongly "sitting" values, but two seconds old
        let store = store_with(start() - Duration::seconds(2), [1500; 12]);
        let poller = poller(store, clock);

        let current = poller.current_reading().unwrap();
        assert_eq!(current, CurrentReading::not_sitting());
    }

    #[test]
    fn test_reading_becomes_stale_after_sender_stops() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start(), [1500; 12]);
        let poller = poller(store, clock.clone());

        assert_eq!(
            poller.current_reading().unwrap().label,
            Posture::SittingCorrectly
        );
        clock.advance(Duration::milliseconds(1051));
        assert_eq!(poller.current_reading().unwrap(), CurrentReading::not_sitting());
    }

    #[test]
    fn test_store_failure_propagates_and_keeps_cache() {
        let clock = Arc::new(ManualClock::new(start()));
        let poller = poller(Arc::new(FailingStore), clock);

        assert!(matches!(poller.current_reading(), Err(ChairError::Store(_))));
        assert!(poller.state().last_poll.is_none());
        assert_eq!(poller.cached(), CurrentReading::not_sitting());
    }

    #[test]
    fn test_concurrent_callers_share_one_fetch() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start(), [1500; 12]);
        let poller = Arc::new(poller(store.clone(), clock));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let poller = Arc::clone(&poller);
                std::thread::spawn(move || poller.current_reading().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().label, Posture::SittingCorrectly);
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_and_interval_change() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(start(), [1500; 12]);
        let poller = poller(store.clone(), clock.clone());

        poller.current_reading().unwrap();
        poller.invalidate();
        poller.current_reading().unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);

        poller.set_polling_interval(Duration::seconds(10));
        clock.advance(Duration::seconds(5));
        poller.current_reading().unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }
}
