//! Recent request volume per model, used by load balancing
//!
//! Hits are counted in fixed time buckets so memory per model is bounded
//! by the bucket count rather than by request rate.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Buckets covering one window
const BUCKETS: u32 = 30;

/// Hit counts for one model, oldest bucket first
#[derive(Debug, Default)]
struct ModelTraffic {
    buckets: VecDeque<(u64, u64)>,
}

impl ModelTraffic {
    fn hit(&mut self, bucket: u64) {
        match self.buckets.back_mut() {
            Some((index, count)) if *index == bucket => *count += 1,
            _ => self.buckets.push_back((bucket, 1)),
        }
    }

    /// Drop buckets that fell out of the window ending at `current`
    fn expire(&mut self, current: u64) {
        while self
            .buckets
            .front()
            .is_some_and(|&(index, _)| index + u64::from(BUCKETS) <= current)
        {
            self.buckets.pop_front();
        }
    }

    fn total(&self) -> u64 {
        self.buckets.iter().map(|&(_, count)| count).sum()
    }
}

/// Sliding-window request counter
pub struct TrafficMeter {
    models: DashMap<String, ModelTraffic>,
    origin: Instant,
    bucket_width: Duration,
}

impl TrafficMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            models: DashMap::new(),
            origin: Instant::now(),
            bucket_width: (window / BUCKETS).max(Duration::from_micros(1)),
        }
    }

    fn current_bucket(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos() / self.bucket_width.as_nanos();
        u64::try_from(elapsed).unwrap_or(u64::MAX)
    }

    /// Count one request sent to `model_id`
    pub fn record(&self, model_id: &str) {
        let bucket = self.current_bucket();
        let mut traffic = self.models.entry(model_id.to_owned()).or_default();
        traffic.expire(bucket);
        traffic.hit(bucket);
    }

    /// Fraction of windowed traffic each model received
    ///
    /// Models with no traffic are absent; an idle meter returns an empty map.
    pub fn shares(&self) -> HashMap<String, f64> {
        let bucket = self.current_bucket();
        self.models.retain(|_, traffic| {
            traffic.expire(bucket);
            !traffic.buckets.is_empty()
        });

        let totals: Vec<(String, u64)> = self
            .models
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().total()))
            .collect();
        let total: u64 = totals.iter().map(|(_, hits)| hits).sum();
        if total == 0 {
            return HashMap::new();
        }

        #[allow(clippy::cast_precision_loss)]
        let shares = totals
            .into_iter()
            .map(|(id, hits)| (id, hits as f64 / total as f64))
            .collect();
        shares
    }
}
