//! Lock-free-on-the-hot-path HTTP traffic statistics.
//!
//! [`HttpStat`] is written to on every request from any number of threads
//! via [`HttpStat::stat`] — that path touches only [`AtomicU64`]s and
//! [`AtomicI64`]s with relaxed ordering, since none of the counters have a
//! causal dependency on one another. The only
//! lock is a [`parking_lot::RwLock`] guarding the duration reservoir and
//! status-code histogram, taken shared by [`HttpStat::stat`] and
//! exclusively by [`HttpStat::status`] — a reader/writer split used purely
//! to exclude concurrent snapshot draining from concurrent recording, not
//! to protect the atomic counters (which need no lock at all).

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

const ORD: Ordering = Ordering::Relaxed;

/// Tick interval the three EWMAs are calibrated against. Callers must call
/// [`HttpStat::tick`] on roughly this cadence (a background timer, or a
/// runtime's own periodic housekeeping) for the 1/5/15-minute rates to mean
/// what their names say.
pub const TICK_INTERVAL_SECS: f64 = 5.0;

/// Maximum number of duration samples held in the reservoir between drains.
pub const RESERVOIR_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// EWMA (classic UNIX load-average formula)
// ---------------------------------------------------------------------------

/// An exponentially-weighted moving average of an event rate, decaying over
/// `window_secs`, updated once per [`HttpStat::tick`] using the same
/// `alpha = 1 - exp(-tick_interval / window)` formula the UNIX `uptime`
/// load averages use.
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    // f64 bit pattern; `None` (represented as `u64::MAX`) until the first tick.
    rate_bits: AtomicU64,
}

const NO_RATE: u64 = u64::MAX;

impl Ewma {
    fn new(window_secs: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / window_secs).exp(),
            uncounted: AtomicU64::new(0),
            rate_bits: AtomicU64::new(NO_RATE),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, ORD);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, ORD) as f64;
        let instant_rate = count / TICK_INTERVAL_SECS;
        let previous = self.rate_bits.load(ORD);
        let next_rate = if previous == NO_RATE {
            instant_rate
        } else {
            let previous_rate = f64::from_bits(previous);
            previous_rate + self.alpha * (instant_rate - previous_rate)
        };
        self.rate_bits.store(next_rate.to_bits(), ORD);
    }

    /// Events per second, or `0.0` before the first tick.
    fn rate_per_sec(&self) -> f64 {
        let bits = self.rate_bits.load(ORD);
        if bits == NO_RATE {
            0.0
        } else {
            f64::from_bits(bits)
        }
    }
}

// ---------------------------------------------------------------------------
// Reservoir sampling
// ---------------------------------------------------------------------------

/// A fixed-capacity simple-random-replacement reservoir of duration samples
/// (milliseconds), drained and cleared by [`HttpStat::status`].
#[derive(Default)]
struct Reservoir {
    samples: Vec<f64>,
    seen: u64,
}

impl Reservoir {
    fn add(&mut self, value_ms: f64) {
        self.seen += 1;
        if self.samples.len() < RESERVOIR_CAPACITY {
            self.samples.push(value_ms);
        } else {
            let j = rand::thread_rng().gen_range(0..self.seen);
            if (j as usize) < RESERVOIR_CAPACITY {
                self.samples[j as usize] = value_ms;
            }
        }
    }

    fn drain(&mut self) -> Vec<f64> {
        self.seen = 0;
        std::mem::take(&mut self.samples)
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// One completed request's observation, as pushed into an [`HttpStat`] by
/// the filter that produced it (typically a proxy filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub status_code: u16,
    pub duration_ms: u64,
    pub req_size: u64,
    pub resp_size: u64,
}

impl Metric {
    pub fn new(status_code: u16, duration_ms: u64, req_size: u64, resp_size: u64) -> Self {
        Self {
            status_code,
            duration_ms,
            req_size,
            resp_size,
        }
    }

    /// A request counts as an error if its status code is >= 400.
    fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

// ---------------------------------------------------------------------------
// HttpStat
// ---------------------------------------------------------------------------

/// Lock-free request/response statistics for one HTTP-speaking component.
pub struct HttpStat {
    count: AtomicU64,
    err_count: AtomicU64,
    total_duration_ms: AtomicU64,
    min_duration_ms: AtomicI64,
    max_duration_ms: AtomicI64,
    req_size: AtomicU64,
    resp_size: AtomicU64,

    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    m1_err: Ewma,
    m5_err: Ewma,
    m15_err: Ewma,

    codes: RwLock<HashMap<u16, u64>>,
    durations: RwLock<Reservoir>,
}

impl Default for HttpStat {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            err_count: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            min_duration_ms: AtomicI64::new(i64::MAX),
            max_duration_ms: AtomicI64::new(i64::MIN),
            req_size: AtomicU64::new(0),
            resp_size: AtomicU64::new(0),
            m1: Ewma::new(60.0),
            m5: Ewma::new(300.0),
            m15: Ewma::new(900.0),
            m1_err: Ewma::new(60.0),
            m5_err: Ewma::new(300.0),
            m15_err: Ewma::new(900.0),
            codes: RwLock::new(HashMap::new()),
            durations: RwLock::new(Reservoir::default()),
        }
    }
}

impl HttpStat {
    /// Creates a fresh, zeroed set of statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed request. An entry counts as an error — for
    /// `errCount` and the `m*ErrPercent`/`m*Err` windows — when its status
    /// code is >= 400, derived from the metric itself rather than left to
    /// caller judgment.
    pub fn stat(&self, metric: Metric) {
        let is_error = metric.is_error();
        self.count.fetch_add(1, ORD);
        if is_error {
            self.err_count.fetch_add(1, ORD);
        }
        self.total_duration_ms.fetch_add(metric.duration_ms, ORD);
        self.req_size.fetch_add(metric.req_size, ORD);
        self.resp_size.fetch_add(metric.resp_size, ORD);

        let duration_ms = metric.duration_ms as i64;
        self.min_duration_ms.fetch_min(duration_ms, ORD);
        self.max_duration_ms.fetch_max(duration_ms, ORD);

        self.m1.update(1);
        self.m5.update(1);
        self.m15.update(1);
        if is_error {
            self.m1_err.update(1);
            self.m5_err.update(1);
            self.m15_err.update(1);
        }

        let mut codes = self.codes.write();
        *codes.entry(metric.status_code).or_insert(0) += 1;
        drop(codes);

        self.durations.write().add(duration_ms as f64);
    }

    /// Advances all six EWMAs by one tick. Private: ticking is a sub-step of
    /// [`HttpStat::status`], not a separately callable operation — the
    /// caller's only obligation is to invoke `status` roughly every
    /// [`TICK_INTERVAL_SECS`] seconds.
    fn tick(&self) {
        self.m1.tick();
        self.m5.tick();
        self.m15.tick();
        self.m1_err.tick();
        self.m5_err.tick();
        self.m15_err.tick();
    }

    /// Takes an exclusive, drain-on-read snapshot: ticks all six EWMAs, then
    /// the percentile reservoir and status-code histogram are cleared so the
    /// next snapshot reflects only what happened since this call. The
    /// monotonic counters (`count`, `err_count`, `total`, `min`, `max`,
    /// sizes) are never reset. Callers are expected to invoke this roughly
    /// every [`TICK_INTERVAL_SECS`] seconds for the EWMA rates to mean what
    /// their names say.
    pub fn status(&self) -> Status {
        self.tick();

        let mut durations = self.durations.write();
        let mut samples = durations.drain();
        drop(durations);
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut codes = self.codes.write();
        let codes_snapshot = codes.clone();
        codes.clear();
        drop(codes);

        let count = self.count.load(ORD);
        let err_count = self.err_count.load(ORD);
        let total = self.total_duration_ms.load(ORD);
        let min = self.min_duration_ms.load(ORD);
        let max = self.max_duration_ms.load(ORD);

        Status {
            count,
            err_count,
            min: if count == 0 { 0 } else { min },
            max: if count == 0 { 0 } else { max },
            mean: if count == 0 { 0.0 } else { total as f64 / count as f64 },
            req_size: self.req_size.load(ORD),
            resp_size: self.resp_size.load(ORD),
            m1: self.m1.rate_per_sec(),
            m5: self.m5.rate_per_sec(),
            m15: self.m15.rate_per_sec(),
            m1_err: self.m1_err.rate_per_sec(),
            m5_err: self.m5_err.rate_per_sec(),
            m15_err: self.m15_err.rate_per_sec(),
            m1_err_percent: err_percent(self.m1_err.rate_per_sec(), self.m1.rate_per_sec()),
            m5_err_percent: err_percent(self.m5_err.rate_per_sec(), self.m5.rate_per_sec()),
            m15_err_percent: err_percent(self.m15_err.rate_per_sec(), self.m15.rate_per_sec()),
            p25: percentile(&samples, 25.0),
            p50: percentile(&samples, 50.0),
            p75: percentile(&samples, 75.0),
            p95: percentile(&samples, 95.0),
            p98: percentile(&samples, 98.0),
            p99: percentile(&samples, 99.0),
            p999: percentile(&samples, 99.9),
            codes: codes_snapshot,
        }
    }
}

/// `m1_err_percent`/`m5_err_percent`/`m15_err_percent` are each computed
/// from their own window's error and throughput EWMAs — not copied from
/// `m1`, which was the bug this engine's design explicitly fixes.
fn err_percent(err_rate: f64, total_rate: f64) -> f64 {
    if total_rate <= 0.0 {
        0.0
    } else {
        (err_rate / total_rate) * 100.0
    }
}

/// A point-in-time, serializable export of [`HttpStat`]'s counters, EWMA
/// rates, percentiles, and status-code histogram, serialized camelCase
/// (`count, m1, m5, m15, errCount, m1Err, m5Err, m15Err, m1ErrPercent,
/// m5ErrPercent, m15ErrPercent, min, max, mean, p25, p50, p75, p95, p98,
/// p99, p999, reqSize, respSize, codes`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub count: u64,
    pub m1: f64,
    pub m5: f64,
    pub m15: f64,
    pub err_count: u64,
    pub m1_err: f64,
    pub m5_err: f64,
    pub m15_err: f64,
    pub m1_err_percent: f64,
    pub m5_err_percent: f64,
    pub m15_err_percent: f64,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    pub req_size: u64,
    pub resp_size: u64,
    pub codes: HashMap<u16, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stat_has_zeroed_status() {
        let stat = HttpStat::new();
        let status = stat.status();
        assert_eq!(status.count, 0);
        assert_eq!(status.err_count, 0);
        assert_eq!(status.min, 0);
        assert_eq!(status.max, 0);
        assert_eq!(status.p50, 0.0);
        assert!(status.codes.is_empty());
    }

    #[test]
    fn record_updates_monotonic_counters() {
        let stat = HttpStat::new();
        stat.stat(Metric::new(200, 10, 100, 200));
        stat.stat(Metric::new(500, 30, 50, 80));
        let status = stat.status();
        assert_eq!(status.count, 2);
        assert_eq!(status.err_count, 1);
        assert_eq!(status.mean, 20.0);
        assert_eq!(status.min, 10);
        assert_eq!(status.max, 30);
        assert_eq!(status.req_size, 150);
        assert_eq!(status.resp_size, 280);
        assert_eq!(status.codes.get(&200), Some(&1));
        assert_eq!(status.codes.get(&500), Some(&1));
    }

    #[test]
    fn status_derives_is_error_from_status_code_not_caller_judgment() {
        let stat = HttpStat::new();
        stat.stat(Metric::new(404, 1, 1, 1));
        stat.stat(Metric::new(204, 1, 1, 1));
        let status = stat.status();
        assert_eq!(status.count, 2);
        assert_eq!(status.err_count, 1, "only the 404 counts as an error");
    }

    #[test]
    fn status_drains_percentiles_and_codes_but_keeps_counters() {
        let stat = HttpStat::new();
        for i in 1..=10u64 {
            stat.stat(Metric::new(200, i, 1, 1));
        }
        let first = stat.status();
        assert_eq!(first.count, 10);
        assert!(first.p50 > 0.0);
        assert_eq!(first.codes.get(&200), Some(&10));

        let second = stat.status();
        assert_eq!(second.count, 10, "monotonic counters are never drained");
        assert_eq!(second.p50, 0.0, "percentile reservoir drains on snapshot");
        assert!(second.codes.is_empty(), "status code histogram drains on snapshot");
    }

    #[test]
    fn tick_without_events_keeps_rate_at_zero() {
        let stat = HttpStat::new();
        let status = stat.status();
        assert_eq!(status.m1, 0.0);
        assert_eq!(status.m1_err_percent, 0.0);
    }

    #[test]
    fn status_ticks_the_ewmas_itself_without_a_separate_caller_call() {
        // A caller that only ever calls `status()` (the documented
        // contract) must still see non-zero rates — ticking must not be a
        // separate operation the caller has to discover and invoke.
        let stat = HttpStat::new();
        for _ in 0..5 {
            stat.stat(Metric::new(200, 1, 1, 1));
        }
        let status = stat.status();
        assert!(status.m1 > 0.0);
    }

    #[test]
    fn error_percent_is_computed_per_window_not_copied_from_m1() {
        let stat = HttpStat::new();
        for _ in 0..5 {
            stat.stat(Metric::new(500, 1, 1, 1));
        }
        let status = stat.status();
        assert!((status.m1_err_percent - 100.0).abs() < 1e-9);
        // m5/m15 decay far more slowly than m1 for the same single tick,
        // so they must differ from m1's value rather than mirror it.
        assert_ne!(status.m1_err_percent, status.m5_err_percent);
        assert_ne!(status.m1_err_percent, status.m15_err_percent);
    }

    #[test]
    fn ewma_alpha_matches_unix_load_average_formula() {
        let m1 = Ewma::new(60.0);
        let expected = 1.0 - (-TICK_INTERVAL_SECS / 60.0_f64).exp();
        assert!((m1.alpha - expected).abs() < 1e-12);
    }
}
