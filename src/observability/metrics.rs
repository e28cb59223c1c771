//! Thread-safe metrics collection
//!
//! Atomic counters for the HTTP surface and the business events the
//! service cares about (orders, stock, reports, recommendations, face
//! logins, mail), plus mutex-protected timing data for requests and batch
//! jobs. Exposed as JSON at `GET /metrics`.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

const MAX_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // HTTP
    requests_total: AtomicU64,
    responses_2xx: AtomicU64,
    responses_4xx: AtomicU64,
    responses_5xx: AtomicU64,
    request_times: Mutex<Vec<u64>>, // milliseconds

    // Orders and stock
    online_orders_created: AtomicU64,
    pos_orders_created: AtomicU64,
    orders_cancelled: AtomicU64,
    stale_orders_cancelled: AtomicU64,
    stock_units_decremented: AtomicU64,

    // Analytics and recommendations
    analytics_reports_written: AtomicU64,
    recommendations_generated: AtomicU64,
    recommendation_failures: AtomicU64,

    // Face login
    face_verifications: AtomicU64,
    face_verification_failures: AtomicU64,

    // Mail
    emails_sent: AtomicU64,
    email_failures: AtomicU64,

    // Batch jobs
    job_stats: Mutex<HashMap<String, JobStats>>,

    // Lifecycle
    uptime_start: AtomicU64,
    health_status: AtomicBool,
    last_health_check: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            requests_total: AtomicU64::new(0),
            responses_2xx: AtomicU64::new(0),
            responses_4xx: AtomicU64::new(0),
            responses_5xx: AtomicU64::new(0),
            request_times: Mutex::new(Vec::new()),
            online_orders_created: AtomicU64::new(0),
            pos_orders_created: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            stale_orders_cancelled: AtomicU64::new(0),
            stock_units_decremented: AtomicU64::new(0),
            analytics_reports_written: AtomicU64::new(0),
            recommendations_generated: AtomicU64::new(0),
            recommendation_failures: AtomicU64::new(0),
            face_verifications: AtomicU64::new(0),
            face_verification_failures: AtomicU64::new(0),
            emails_sent: AtomicU64::new(0),
            email_failures: AtomicU64::new(0),
            job_stats: Mutex::new(HashMap::new()),
            uptime_start: AtomicU64::new(now),
            health_status: AtomicBool::new(true),
            last_health_check: AtomicU64::new(now),
        }
    }

    // HTTP metrics
    pub fn http_response(&self, status: u16, duration: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        match status {
            200..=399 => self.responses_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.responses_4xx.fetch_add(1, Ordering::Relaxed),
            _ => self.responses_5xx.fetch_add(1, Ordering::Relaxed),
        };
        if let Ok(mut times) = self.request_times.lock() {
            push_bounded(&mut times, duration.as_millis() as u64);
        }
    }

    // Order metrics
    pub fn online_order_created(&self) {
        self.online_orders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pos_order_created(&self) {
        self.pos_orders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_orders_cancelled(&self, count: u64) {
        self.stale_orders_cancelled
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn stock_decremented(&self, units: u64) {
        self.stock_units_decremented
            .fetch_add(units, Ordering::Relaxed);
    }

    // Analytics metrics
    pub fn analytics_report_written(&self) {
        self.analytics_reports_written
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn recommendation_generated(&self) {
        self.recommendations_generated
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn recommendation_failed(&self) {
        self.recommendation_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Face metrics
    pub fn face_verification(&self, success: bool) {
        if success {
            self.face_verifications.fetch_add(1, Ordering::Relaxed);
        } else {
            self.face_verification_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    // Mail metrics
    pub fn email_sent(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn email_failed(&self) {
        self.email_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Batch job metrics
    pub fn job_finished(&self, job: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.job_stats.lock() {
            let entry = stats.entry(job.to_string()).or_insert_with(|| JobStats {
                runs: 0,
                failures: 0,
                run_times: Vec::new(),
                last_run: 0,
            });
            entry.runs += 1;
            entry.last_run = current_timestamp();
            push_bounded(&mut entry.run_times, duration.as_millis() as u64);
            if !success {
                entry.failures += 1;
            }
        }
    }

    // Health status metrics
    pub fn update_health_status(&self, healthy: bool) {
        self.health_status.store(healthy, Ordering::Relaxed);
        self.last_health_check
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.requests_total,
            &self.responses_2xx,
            &self.responses_4xx,
            &self.responses_5xx,
            &self.online_orders_created,
            &self.pos_orders_created,
            &self.orders_cancelled,
            &self.stale_orders_cancelled,
            &self.stock_units_decremented,
            &self.analytics_reports_written,
            &self.recommendations_generated,
            &self.recommendation_failures,
            &self.face_verifications,
            &self.face_verification_failures,
            &self.emails_sent,
            &self.email_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut times) = self.request_times.lock() {
            times.clear();
        }
        if let Ok(mut stats) = self.job_stats.lock() {
            stats.clear();
        }
        let now = current_timestamp();
        self.uptime_start.store(now, Ordering::Relaxed);
        self.health_status.store(true, Ordering::Relaxed);
        self.last_health_check.store(now, Ordering::Relaxed);
    }

    fn request_time_statistics(&self) -> (f64, f64, f64, f64) {
        let Ok(times) = self.request_times.lock() else {
            return (0.0, 0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let mut sorted = times.clone();
        sorted.sort_unstable();
        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (
            avg,
            percentile(&sorted, 50.0),
            percentile(&sorted, 95.0),
            percentile(&sorted, 99.0),
        )
    }

    fn job_snapshots(&self) -> HashMap<String, JobStatsSnapshot> {
        let Ok(stats) = self.job_stats.lock() else {
            return HashMap::new();
        };
        stats
            .iter()
            .map(|(name, stats)| {
                let avg_run_time_ms = if stats.run_times.is_empty() {
                    0.0
                } else {
                    stats.run_times.iter().sum::<u64>() as f64 / stats.run_times.len() as f64
                };
                (
                    name.clone(),
                    JobStatsSnapshot {
                        runs: stats.runs,
                        failures: stats.failures,
                        avg_run_time_ms,
                        last_run: stats.last_run,
                    },
                )
            })
            .collect()
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_response_time_ms, p50, p95, p99) = self.request_time_statistics();

        MetricsSnapshot {
            http: HttpMetrics {
                requests_total: self.requests_total.load(Ordering::Relaxed),
                responses_2xx: self.responses_2xx.load(Ordering::Relaxed),
                responses_4xx: self.responses_4xx.load(Ordering::Relaxed),
                responses_5xx: self.responses_5xx.load(Ordering::Relaxed),
                avg_response_time_ms,
                response_time_p50_ms: p50,
                response_time_p95_ms: p95,
                response_time_p99_ms: p99,
            },
            business: BusinessMetrics {
                online_orders_created: self.online_orders_created.load(Ordering::Relaxed),
                pos_orders_created: self.pos_orders_created.load(Ordering::Relaxed),
                orders_cancelled: self.orders_cancelled.load(Ordering::Relaxed),
                stale_orders_cancelled: self.stale_orders_cancelled.load(Ordering::Relaxed),
                stock_units_decremented: self.stock_units_decremented.load(Ordering::Relaxed),
                analytics_reports_written: self.analytics_reports_written.load(Ordering::Relaxed),
                recommendations_generated: self.recommendations_generated.load(Ordering::Relaxed),
                recommendation_failures: self.recommendation_failures.load(Ordering::Relaxed),
                face_verifications: self.face_verifications.load(Ordering::Relaxed),
                face_verification_failures: self
                    .face_verification_failures
                    .load(Ordering::Relaxed),
                emails_sent: self.emails_sent.load(Ordering::Relaxed),
                email_failures: self.email_failures.load(Ordering::Relaxed),
            },
            jobs: self.job_snapshots(),
            lifecycle: LifecycleMetrics {
                uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
                healthy: self.health_status.load(Ordering::Relaxed),
                last_health_check: self.last_health_check.load(Ordering::Relaxed),
            },
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct JobStats {
    runs: u64,
    failures: u64,
    run_times: Vec<u64>, // milliseconds
    last_run: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub http: HttpMetrics,
    pub business: BusinessMetrics,
    pub jobs: HashMap<String, JobStatsSnapshot>,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct HttpMetrics {
    pub requests_total: u64,
    pub responses_2xx: u64,
    pub responses_4xx: u64,
    pub responses_5xx: u64,
    pub avg_response_time_ms: f64,
    pub response_time_p50_ms: f64,
    pub response_time_p95_ms: f64,
    pub response_time_p99_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct BusinessMetrics {
    pub online_orders_created: u64,
    pub pos_orders_created: u64,
    pub orders_cancelled: u64,
    pub stale_orders_cancelled: u64,
    pub stock_units_decremented: u64,
    pub analytics_reports_written: u64,
    pub recommendations_generated: u64,
    pub recommendation_failures: u64,
    pub face_verifications: u64,
    pub face_verification_failures: u64,
    pub emails_sent: u64,
    pub email_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct JobStatsSnapshot {
    pub runs: u64,
    pub failures: u64,
    pub avg_run_time_ms: f64,
    pub last_run: u64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub uptime_seconds: u64,
    pub healthy: bool,
    pub last_health_check: u64,
}

fn push_bounded(samples: &mut Vec<u64>, value: u64) {
    samples.push(value);
    if samples.len() > MAX_SAMPLES {
        samples.remove(0);
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_http_metrics_by_status_class() {
        let collector = MetricsCollector::new();

        collector.http_response(201, Duration::from_millis(12));
        collector.http_response(404, Duration::from_millis(3));
        collector.http_response(409, Duration::from_millis(5));
        collector.http_response(500, Duration::from_millis(40));

        let metrics = collector.get_metrics();
        assert_eq!(metrics.http.requests_total, 4);
        assert_eq!(metrics.http.responses_2xx, 1);
        assert_eq!(metrics.http.responses_4xx, 2);
        assert_eq!(metrics.http.responses_5xx, 1);
        assert!(metrics.http.avg_response_time_ms > 10.0);
    }

    #[test]
    fn test_business_counters() {
        let collector = MetricsCollector::new();

        collector.online_order_created();
        collector.pos_order_created();
        collector.stock_decremented(7);
        collector.stale_orders_cancelled(3);
        collector.face_verification(false);
        collector.email_failed();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.business.online_orders_created, 1);
        assert_eq!(metrics.business.pos_orders_created, 1);
        assert_eq!(metrics.business.stock_units_decremented, 7);
        assert_eq!(metrics.business.stale_orders_cancelled, 3);
        assert_eq!(metrics.business.face_verification_failures, 1);
        assert_eq!(metrics.business.email_failures, 1);
    }

    #[test]
    fn test_job_stats() {
        let collector = MetricsCollector::new();

        collector.job_finished("generate_analytics", Duration::from_millis(500), true);
        collector.job_finished("generate_analytics", Duration::from_millis(300), false);

        let metrics = collector.get_metrics();
        let stats = metrics.jobs.get("generate_analytics").unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failures, 1);
        assert!(stats.avg_run_time_ms > 350.0);
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for _ in 0..100 {
                        collector.online_order_created();
                        collector.email_sent();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = collector.get_metrics();
        assert_eq!(metrics.business.online_orders_created, 1000);
        assert_eq!(metrics.business.emails_sent, 1000);
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        assert!((percentile(&data, 50.0) - 5.5).abs() < 0.1);
        assert!((percentile(&data, 95.0) - 9.55).abs() < 0.1);
        assert!((percentile(&data, 0.0) - 1.0).abs() < 0.1);
        assert!((percentile(&data, 100.0) - 10.0).abs() < 0.1);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_samples_are_bounded() {
        let mut samples = Vec::new();
        for i in 0..1500 {
            push_bounded(&mut samples, i);
        }
        assert_eq!(samples.len(), MAX_SAMPLES);
        assert_eq!(samples[0], 500);
    }

    #[test]
    fn test_reset_functionality() {
        let collector = MetricsCollector::new();

        collector.pos_order_created();
        collector.job_finished("seed", Duration::from_millis(10), true);
        collector.reset();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.business.pos_orders_created, 0);
        assert!(metrics.jobs.is_empty());
    }
}
