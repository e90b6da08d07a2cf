//! Error kinds shared by the hot path and the control plane.
//!
//! [`CoreError`] is the single type the HTTP layer matches on to pick a status code;
//! everything else (config parsing, cache I/O, JSON encoding) keeps using `anyhow::Result`
//! with [`tilefarm_derive::context`] attached at call sites, and is folded into
//! [`CoreError::Internal`] only at the seam where the pipeline crosses into the response.

use std::fmt;

/// The outcomes the request pipeline can produce, matching the propagation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
	/// Malformed request: out-of-range `z`/`x`/`y`, invalid enum, `month` without `MONTH`, ...
	BadRequest(String),
	/// Unknown layer, unknown/inactive visparam, or year outside the layer's supported range.
	NotFound(String),
	/// Edge limiter denial, open circuit breaker, or upstream `429` after retries are exhausted.
	Throttled { retry_after_secs: u64 },
	/// Admin endpoint called without credentials.
	Unauthorized,
	/// Admin endpoint called with credentials lacking the required role.
	Forbidden,
	/// Upstream failed after retry exhaustion for a transient reason.
	UpstreamTransient,
	/// Upstream failed for a reason that will not succeed on retry (e.g. empty collection).
	UpstreamPermanent { reason: String },
	/// A suspension point exceeded the request deadline.
	Timeout,
	/// Anything else. Logged with full context, never leaked into the response body.
	Internal,
}

impl CoreError {
	/// The HTTP status code this error maps to.
	#[must_use]
	pub fn status_code(&self) -> u16 {
		match self {
			CoreError::BadRequest(_) => 400,
			CoreError::NotFound(_) => 404,
			CoreError::Throttled { .. } => 429,
			CoreError::Unauthorized => 401,
			CoreError::Forbidden => 403,
			CoreError::UpstreamTransient | CoreError::UpstreamPermanent { .. } => 502,
			CoreError::Timeout => 504,
			CoreError::Internal => 500,
		}
	}

	/// `Retry-After` seconds, for the variants that carry one.
	#[must_use]
	pub fn retry_after_secs(&self) -> Option<u64> {
		match self {
			CoreError::Throttled { retry_after_secs } => Some(*retry_after_secs),
			_ => None,
		}
	}

	/// Whether this error is safe to describe in the response body.
	///
	/// `Internal` never is: its `Display` text may carry arbitrary context from `anyhow`.
	#[must_use]
	pub fn is_client_safe(&self) -> bool {
		!matches!(self, CoreError::Internal)
	}
}

impl fmt::Display for CoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CoreError::BadRequest(msg) => write!(f, "bad request: {msg}"),
			CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
			CoreError::Throttled { retry_after_secs } => {
				write!(f, "throttled, retry after {retry_after_secs}s")
			}
			CoreError::Unauthorized => write!(f, "unauthorized"),
			CoreError::Forbidden => write!(f, "forbidden"),
			CoreError::UpstreamTransient => write!(f, "upstream failed transiently"),
			CoreError::UpstreamPermanent { reason } => write!(f, "upstream failed permanently: {reason}"),
			CoreError::Timeout => write!(f, "deadline exceeded"),
			CoreError::Internal => write!(f, "internal error"),
		}
	}
}

impl std::error::Error for CoreError {}

/// Converts an opaque failure (config, I/O, JSON) into the one catch-all HTTP outcome.
///
/// Call sites that need a specific status code should construct the matching [`CoreError`]
/// variant directly instead of relying on this conversion.
impl From<anyhow::Error> for CoreError {
	fn from(err: anyhow::Error) -> Self {
		log::error!("{err:#}");
		CoreError::Internal
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_match_the_propagation_table() {
		assert_eq!(CoreError::BadRequest("x".into()).status_code(), 400);
		assert_eq!(CoreError::NotFound("x".into()).status_code(), 404);
		assert_eq!(CoreError::Throttled { retry_after_secs: 5 }.status_code(), 429);
		assert_eq!(CoreError::Unauthorized.status_code(), 401);
		assert_eq!(CoreError::Forbidden.status_code(), 403);
		assert_eq!(CoreError::UpstreamTransient.status_code(), 502);
		assert_eq!(
			CoreError::UpstreamPermanent { reason: "x".into() }.status_code(),
			502
		);
		assert_eq!(CoreError::Timeout.status_code(), 504);
		assert_eq!(CoreError::Internal.status_code(), 500);
	}

	#[test]
	fn internal_is_never_client_safe() {
		assert!(!CoreError::Internal.is_client_safe());
		assert!(CoreError::BadRequest("x".into()).is_client_safe());
	}

	#[test]
	fn anyhow_errors_become_internal() {
		let err: CoreError = anyhow::anyhow!("disk on fire").into();
		assert_eq!(err, CoreError::Internal);
	}
}
