//! Rolling success/failure window.
//!
//! A fixed ring of `bucket_count` buckets, each covering
//! `rolling_window / bucket_count` of wall-clock time. Buckets are addressed
//! by their absolute slot number since the window origin, so a bucket whose
//! slot has fallen more than `bucket_count` slots behind "now" is stale: it
//! is excluded from every read and zeroed before reuse. Memory never grows
//! past the ring.

use std::time::Duration;

use tokio::time::Instant;

/// How a completed call counts towards the failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallVerdict {
    Success,
    Failure,
}

/// Aggregated tallies across live buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowTotals {
    pub successes: u64,
    pub failures: u64,
}

impl WindowTotals {
    pub fn volume(&self) -> u64 {
        self.successes + self.failures
    }

    /// Fraction of failed calls, `0.0` when nothing was recorded.
    pub fn failure_rate(&self) -> f64 {
        match self.volume() {
            0 => 0.0,
            volume => self.failures as f64 / volume as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    slot: u64,
    successes: u64,
    failures: u64,
}

impl Bucket {
    fn is_empty(&self) -> bool {
        self.successes == 0 && self.failures == 0
    }
}

/// Time-bucketed tally of recent call outcomes.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    origin: Instant,
    bucket_duration: Duration,
    buckets: Vec<Bucket>,
}

impl RollingWindow {
    pub fn new(rolling_window: Duration, bucket_count: usize) -> Self {
        Self::starting_at(Instant::now(), rolling_window, bucket_count)
    }

    pub fn starting_at(origin: Instant, rolling_window: Duration, bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        let bucket_duration = (rolling_window / bucket_count as u32).max(Duration::from_millis(1));
        Self {
            origin,
            bucket_duration,
            buckets: vec![Bucket::default(); bucket_count],
        }
    }

    pub fn bucket_duration(&self) -> Duration {
        self.bucket_duration
    }

    /// Start time of the bucket that `now` falls into.
    pub fn bucket_started_at(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin);
        let into_bucket = elapsed.as_nanos() % self.bucket_duration.as_nanos();
        self.origin + (elapsed - Duration::from_nanos(into_bucket as u64))
    }

    /// Add one outcome to the bucket covering `now`.
    pub fn record(&mut self, verdict: CallVerdict, now: Instant) {
        let slot = self.slot_at(now);
        self.evict(slot);

        let index = (slot % self.buckets.len() as u64) as usize;
        let bucket = &mut self.buckets[index];
        if bucket.slot != slot {
            *bucket = Bucket {
                slot,
                ..Bucket::default()
            };
        }
        match verdict {
            CallVerdict::Success => bucket.successes += 1,
            CallVerdict::Failure => bucket.failures += 1,
        }
    }

    /// Sum over the buckets still inside the window at `now`.
    pub fn totals(&self, now: Instant) -> WindowTotals {
        let slot = self.slot_at(now);
        self.buckets
            .iter()
            .filter(|b| self.is_live(b, slot))
            .fold(WindowTotals::default(), |acc, b| WindowTotals {
                successes: acc.successes + b.successes,
                failures: acc.failures + b.failures,
            })
    }

    pub fn failure_rate(&self, now: Instant) -> f64 {
        self.totals(now).failure_rate()
    }

    /// Drop every tally.
    pub fn reset(&mut self) {
        self.buckets.fill(Bucket::default());
    }

    fn slot_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin);
        (elapsed.as_nanos() / self.bucket_duration.as_nanos()) as u64
    }

    fn is_live(&self, bucket: &Bucket, current: u64) -> bool {
        bucket.slot <= current && current - bucket.slot < self.buckets.len() as u64
    }

    fn evict(&mut self, current: u64) {
        let len = self.buckets.len() as u64;
        for bucket in &mut self.buckets {
            let stale = bucket.slot > current || current - bucket.slot >= len;
            if stale && !bucket.is_empty() {
                *bucket = Bucket::default();
            }
        }
    }
}
