//! Performance sampling.
//!
//! CPU and memory come from the OS through `sysinfo`. Network throughput is
//! derived from byte counters the host reports, and tick rate from the host's
//! `tick` calls. A short cache window keeps back-to-back reads from
//! re-sampling the process.

use crate::config::MonitoringConfig;
use crate::events::AlertKind;
use crate::registry::NetworkQuality;
use crate::types::{current_timestamp, PerformanceMetrics, PlayerConnection};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tracing::{trace, warn};

/// Snapshots younger than this are returned without re-sampling.
pub const METRICS_CACHE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct PerformanceMonitor {
    system: System,
    pid: Pid,
    cpu_count: usize,
    total_bytes_in: u64,
    total_bytes_out: u64,
    last_bytes_in: u64,
    last_bytes_out: u64,
    ticks_since_sample: u64,
    last_sample: Option<Instant>,
    latest: PerformanceMetrics,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
            cpu_count: num_cpus::get().max(1),
            total_bytes_in: 0,
            total_bytes_out: 0,
            last_bytes_in: 0,
            last_bytes_out: 0,
            ticks_since_sample: 0,
            last_sample: None,
            latest: PerformanceMetrics::default(),
        }
    }

    pub fn record_traffic(&mut self, bytes_in: u64, bytes_out: u64) {
        self.total_bytes_in = self.total_bytes_in.saturating_add(bytes_in);
        self.total_bytes_out = self.total_bytes_out.saturating_add(bytes_out);
    }

    pub fn record_tick(&mut self) {
        self.ticks_since_sample += 1;
    }

    /// Whether a snapshot taken at `now` would come from the cache.
    pub fn is_cached(&self, now: Instant) -> bool {
        self.last_sample
            .is_some_and(|t| now.saturating_duration_since(t) < METRICS_CACHE_WINDOW)
    }

    /// Takes a fresh sample, or returns the cached one inside the cache window.
    ///
    /// The first sample only establishes the throughput baseline.
    pub fn collect(
        &mut self,
        now: Instant,
        quality: NetworkQuality,
        active_sessions: usize,
    ) -> PerformanceMetrics {
        if self.is_cached(now) {
            return self.latest.clone();
        }

        let (cpu_usage_percent, memory_usage_mb) = self.sample_process();

        let elapsed = self
            .last_sample
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .filter(|secs| *secs > 0.0);
        let (network_in_kbps, network_out_kbps, tick_rate) = match elapsed {
            Some(secs) => (
                kilobytes(self.total_bytes_in - self.last_bytes_in) / secs,
                kilobytes(self.total_bytes_out - self.last_bytes_out) / secs,
                self.ticks_since_sample as f32 / secs,
            ),
            None => (0.0, 0.0, 0.0),
        };

        self.last_bytes_in = self.total_bytes_in;
        self.last_bytes_out = self.total_bytes_out;
        self.ticks_since_sample = 0;
        self.last_sample = Some(now);

        self.latest = PerformanceMetrics {
            cpu_usage_percent,
            memory_usage_mb,
            network_in_kbps,
            network_out_kbps,
            tick_rate,
            connected_players: quality.connected_players,
            active_sessions,
            average_latency_ms: quality.average_latency_ms,
            packet_loss_percent: quality.packet_loss_percent,
            last_update: current_timestamp(),
        };
        trace!(metrics = ?self.latest, "Collected performance metrics");
        self.latest.clone()
    }

    /// Process CPU (whole-machine percent) and resident memory (MB).
    fn sample_process(&mut self) -> (f32, f32) {
        if !self.system.refresh_process(self.pid) {
            warn!("Unable to refresh process statistics for pid {}", self.pid);
            return (self.latest.cpu_usage_percent, self.latest.memory_usage_mb);
        }
        match self.system.process(self.pid) {
            Some(process) => (
                process.cpu_usage() / self.cpu_count as f32,
                process.memory() as f32 / (1024.0 * 1024.0),
            ),
            None => (0.0, 0.0),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn kilobytes(bytes: u64) -> f32 {
    bytes as f32 / 1024.0
}

/// Mean ping and packet loss across players.
///
/// Loss is `sum((in + out) * 50) / count`, with `in`/`out` as fractions,
/// i.e. the mean of the two directions expressed in percent.
pub fn aggregate_network_quality<'a>(
    players: impl IntoIterator<Item = &'a PlayerConnection>,
) -> NetworkQuality {
    let mut count = 0usize;
    let mut total_ping = 0.0f32;
    let mut total_loss = 0.0f32;
    for player in players {
        count += 1;
        total_ping += player.ping_ms;
        total_loss += (player.packet_loss_in + player.packet_loss_out) * 50.0;
    }

    if count == 0 {
        return NetworkQuality::default();
    }
    NetworkQuality {
        connected_players: count,
        average_latency_ms: total_ping / count as f32,
        packet_loss_percent: total_loss / count as f32,
    }
}

/// Thresholds exceeded by `metrics`, as `(kind, value, threshold)`.
pub fn check_alerts(
    metrics: &PerformanceMetrics,
    config: &MonitoringConfig,
) -> Vec<(AlertKind, f32, f32)> {
    if !config.enable_alerts {
        return Vec::new();
    }

    [
        (AlertKind::Cpu, metrics.cpu_usage_percent, config.cpu_alert_threshold),
        (AlertKind::Memory, metrics.memory_usage_mb, config.memory_alert_threshold),
        (AlertKind::Latency, metrics.average_latency_ms, config.latency_alert_threshold),
    ]
    .into_iter()
    .filter(|(_, value, threshold)| value > threshold)
    .collect()
}
