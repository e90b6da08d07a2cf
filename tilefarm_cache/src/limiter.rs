//! Edge rate limiting and upstream protection (spec §4.8): a per-identity token bucket
//! at the edge, a bounded concurrency window plus pacing toward upstream, and a circuit
//! breaker that opens when upstream faults dominate.

use crate::meta_store::MetaStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Outcome of an edge admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeDecision {
	Allowed,
	Throttled { retry_after_secs: u64 },
}

/// Circuit breaker state (spec §4.8): `Closed` passes traffic, `Open` rejects outright
/// until `reset_after` elapses, `HalfOpen` lets a single probe through to decide whether
/// to close again or re-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
	Closed,
	Open,
	HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
	/// Tokens per second granted to a single client identity at the edge.
	pub edge_rate_per_sec: f64,
	/// Burst capacity for the edge bucket.
	pub edge_capacity: f64,
	/// Maximum number of upstream calls in flight at once.
	pub upstream_concurrency: usize,
	/// Minimum spacing enforced between upstream call starts (pacing).
	pub upstream_min_interval: Duration,
	/// Consecutive upstream faults required to open the circuit.
	pub circuit_fault_threshold: u32,
	/// How long the circuit stays `Open` before allowing a `HalfOpen` probe.
	pub circuit_reset_after: Duration,
}

impl Default for LimiterConfig {
	fn default() -> Self {
		Self {
			edge_rate_per_sec: 5.0,
			edge_capacity: 20.0,
			upstream_concurrency: 8,
			upstream_min_interval: Duration::from_millis(10),
			circuit_fault_threshold: 5,
			circuit_reset_after: Duration::from_secs(30),
		}
	}
}

struct CircuitBreaker {
	state: Mutex<CircuitState>,
	consecutive_faults: AtomicU32,
	opened_at: Mutex<Option<Instant>>,
	half_open_probe_in_flight: AtomicU32,
}

impl CircuitBreaker {
	fn new() -> Self {
		Self {
			state: Mutex::new(CircuitState::Closed),
			consecutive_faults: AtomicU32::new(0),
			opened_at: Mutex::new(None),
			half_open_probe_in_flight: AtomicU32::new(0),
		}
	}

	fn state(&self) -> CircuitState {
		*self.state.lock()
	}

	/// Called before an upstream call. Returns whether the call may proceed, and if so,
	/// whether it is acting as the `HalfOpen` probe.
	fn admit(&self, reset_after: Duration) -> Option<bool> {
		let mut state = self.state.lock();
		match *state {
			CircuitState::Closed => Some(false),
			CircuitState::Open => {
				let opened_at = *self.opened_at.lock();
				if opened_at.is_some_and(|t| t.elapsed() >= reset_after) {
					*state = CircuitState::HalfOpen;
					self.half_open_probe_in_flight.store(1, Ordering::SeqCst);
					Some(true)
				} else {
					None
				}
			}
			CircuitState::HalfOpen => {
				if self.half_open_probe_in_flight.swap(1, Ordering::SeqCst) == 0 {
					Some(true)
				} else {
					None
				}
			}
		}
	}

	fn record_success(&self) {
		self.consecutive_faults.store(0, Ordering::SeqCst);
		let mut state = self.state.lock();
		if *state != CircuitState::Closed {
			*state = CircuitState::Closed;
			*self.opened_at.lock() = None;
			self.half_open_probe_in_flight.store(0, Ordering::SeqCst);
		}
	}

	fn record_fault(&self, threshold: u32) {
		let mut state = self.state.lock();
		if *state == CircuitState::HalfOpen {
			*state = CircuitState::Open;
			*self.opened_at.lock() = Some(Instant::now());
			self.half_open_probe_in_flight.store(0, Ordering::SeqCst);
			return;
		}

		let faults = self.consecutive_faults.fetch_add(1, Ordering::SeqCst) + 1;
		if faults >= threshold && *state == CircuitState::Closed {
			*state = CircuitState::Open;
			*self.opened_at.lock() = Some(Instant::now());
		}
	}
}

/// Guard returned by [`Limiter::admit_upstream`]. Dropping it releases the concurrency
/// slot; callers report the outcome via [`UpstreamPermit::succeed`]/[`UpstreamPermit::fail`]
/// so the circuit breaker learns from it.
pub struct UpstreamPermit<'a> {
	_semaphore_permit: tokio::sync::SemaphorePermit<'a>,
	breaker: &'a CircuitBreaker,
	fault_threshold: u32,
	settled: bool,
}

impl UpstreamPermit<'_> {
	pub fn succeed(mut self) {
		self.breaker.record_success();
		self.settled = true;
	}

	pub fn fail(mut self) {
		self.breaker.record_fault(self.fault_threshold);
		self.settled = true;
	}
}

impl Drop for UpstreamPermit<'_> {
	fn drop(&mut self) {
		if !self.settled {
			// Caller dropped the permit without reporting (e.g. cancelled request);
			// treat as a fault so a genuinely wedged upstream still trips the breaker.
			self.breaker.record_fault(self.fault_threshold);
		}
	}
}

/// Composes the edge token bucket, the upstream concurrency/pacing window, and the
/// circuit breaker into the single admission surface the engine calls through.
pub struct Limiter {
	meta: Arc<dyn MetaStore>,
	config: LimiterConfig,
	semaphore: Semaphore,
	breaker: CircuitBreaker,
	last_upstream_start: Mutex<Option<Instant>>,
}

impl Limiter {
	#[must_use]
	pub fn new(meta: Arc<dyn MetaStore>, config: LimiterConfig) -> Self {
		Self {
			meta,
			semaphore: Semaphore::new(config.upstream_concurrency),
			breaker: CircuitBreaker::new(),
			last_upstream_start: Mutex::new(None),
			config,
		}
	}

	/// Edge admission check for `client_identity` (spec §4.8: a per-caller token bucket).
	pub async fn admit_edge(&self, client_identity: &str) -> EdgeDecision {
		let key = format!("edge_bucket:{client_identity}");
		let decision = self
			.meta
			.incr_bucket(&key, 1.0, self.config.edge_capacity, self.config.edge_rate_per_sec, OffsetDateTime::now_utc())
			.await;

		if decision.allowed {
			EdgeDecision::Allowed
		} else {
			let retry_after_secs = (decision.reset_at - OffsetDateTime::now_utc()).whole_seconds().max(1) as u64;
			EdgeDecision::Throttled { retry_after_secs }
		}
	}

	/// Current circuit breaker state, for status reporting (spec §4.11).
	#[must_use]
	pub fn circuit_state(&self) -> CircuitState {
		self.breaker.state()
	}

	/// Acquires a slot in the upstream concurrency window, enforcing minimum pacing
	/// between call starts and refusing outright while the circuit is `Open`.
	///
	/// Returns `None` when the circuit is open and no `HalfOpen` probe slot is free;
	/// callers should treat that as `CoreError::Throttled`.
	pub async fn admit_upstream(&self) -> Option<UpstreamPermit<'_>> {
		let _is_probe = self.breaker.admit(self.config.circuit_reset_after)?;

		let permit = self.semaphore.acquire().await.expect("semaphore is never closed");

		let mut last_start = self.last_upstream_start.lock();
		if let Some(previous) = *last_start {
			let elapsed = previous.elapsed();
			if elapsed < self.config.upstream_min_interval {
				let wait = self.config.upstream_min_interval - elapsed;
				drop(last_start);
				tokio::time::sleep(wait).await;
				last_start = self.last_upstream_start.lock();
			}
		}
		*last_start = Some(Instant::now());
		drop(last_start);

		Some(UpstreamPermit {
			_semaphore_permit: permit,
			breaker: &self.breaker,
			fault_threshold: self.config.circuit_fault_threshold,
			settled: false,
		})
	}
}
