use std::fmt::{self, Display};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of one matched probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub seq_cnt: u16,
    pub rtt: Duration,
    pub source: Ipv4Addr,
    pub ttl: u8,
    /// ICMP bytes received, header included.
    pub bytes: usize,
}

impl ProbeResult {
    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }
}

impl Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes from {}: icmp_seq={} ttl={} time={} ms",
            self.bytes,
            self.source,
            self.seq_cnt,
            self.ttl,
            format_rtt(self.rtt_ms())
        )
    }
}

/// Keeps three significant digits for small values, like the usual ping tools.
pub fn format_rtt(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.3}", ms)
    } else if ms < 10.0 {
        format!("{:.2}", ms)
    } else if ms < 100.0 {
        format!("{:.1}", ms)
    } else {
        format!("{:.0}", ms)
    }
}

struct RttTotals {
    received: u64,
    min: f64,
    max: f64,
    sum: f64,
    sum2: f64,
}

impl Default for RttTotals {
    fn default() -> Self {
        RttTotals {
            received: 0,
            min: f64::MAX,
            max: 0.0,
            sum: 0.0,
            sum2: 0.0,
        }
    }
}

/// Running totals of one session.
///
/// Every method takes `&self`, so the accumulator can be shared with
/// whatever thread wants a snapshot. The floating point totals and the
/// received count sit behind one lock so a snapshot never sees a reply
/// counted without its RTT.
pub struct Statistics {
    started: Instant,
    transmitted: AtomicU64,
    rtt: Mutex<RttTotals>,
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics {
            started: Instant::now(),
            transmitted: AtomicU64::new(0),
            rtt: Mutex::new(RttTotals::default()),
        }
    }

    pub fn record_sent(&self) {
        self.transmitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_received(&self, rtt_ms: f64) {
        let mut rtt = self.rtt.lock().unwrap_or_else(PoisonError::into_inner);
        rtt.received += 1;
        rtt.sum += rtt_ms;
        rtt.sum2 += rtt_ms * rtt_ms;
        rtt.min = rtt.min.min(rtt_ms);
        rtt.max = rtt.max.max(rtt_ms);
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted.load(Ordering::SeqCst)
    }

    pub fn summarize(&self) -> Summary {
        self.summarize_at(self.started.elapsed())
    }

    fn summarize_at(&self, elapsed: Duration) -> Summary {
        let rtt = self.rtt.lock().unwrap_or_else(PoisonError::into_inner);
        let transmitted = self.transmitted();
        let received = rtt.received;

        let loss_pct = if transmitted > 0 {
            transmitted.saturating_sub(received) * 100 / transmitted
        } else {
            0
        };

        let (rtt_min, rtt_avg, rtt_max, rtt_mdev) = if received > 0 {
            let n = received as f64;
            let avg = rtt.sum / n;
            let variance = (rtt.sum2 / n - avg * avg).max(0.0);
            (rtt.min, avg, rtt.max, variance.sqrt())
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        Summary {
            transmitted,
            received,
            loss_pct,
            rtt_min,
            rtt_avg,
            rtt_max,
            rtt_mdev,
            elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub transmitted: u64,
    pub received: u64,
    pub loss_pct: u64,
    pub rtt_min: f64,
    pub rtt_avg: f64,
    pub rtt_max: f64,
    pub rtt_mdev: f64,
    pub elapsed: Duration,
}

impl Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} packets transmitted, {} received, {}% packet loss, time {}ms",
            self.transmitted,
            self.received,
            self.loss_pct,
            self.elapsed.as_millis()
        )?;
        write!(
            f,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            self.rtt_min, self.rtt_avg, self.rtt_max, self.rtt_mdev
        )
    }
}
