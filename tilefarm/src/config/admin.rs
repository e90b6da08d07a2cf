//! Control-plane authentication configuration for the Tile Farm server.
//!
//! This module defines the [`AdminConfig`] struct. Identity and user management
//! proper is an external collaborator (spec §1); this only configures the single
//! super-admin credential the reference control plane checks HTTP Basic Auth
//! against, and the required role (`ADMIN_REQUIRED_ROLE`).
//!
//! # Example YAML
//! ```yaml
//! admin:
//!   username: admin
//!   password: change-me
//!   required_role: super-admin
//!   disabled: false
//! ```
//!
//! All fields are optional. Defaults are applied when values are not specified.

use serde::Deserialize;
use tilefarm_derive::ConfigDoc;

/// Configuration for the authenticated admin endpoints (spec §4.11, §6).
///
/// * `username` — HTTP Basic Auth username accepted for admin endpoints.
/// * `password` — HTTP Basic Auth password accepted for admin endpoints.
/// * `required_role` — Role an authenticated caller must hold (`ADMIN_REQUIRED_ROLE`).
/// * `disabled` — If `true`, every admin endpoint returns `Forbidden` regardless of credentials.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
	/// Optional HTTP Basic Auth username for admin endpoints
	/// Defaults to unset, which disables admin authentication entirely
	#[serde()]
	#[config_demo("admin")]
	pub username: Option<String>,

	/// Optional HTTP Basic Auth password for admin endpoints
	/// Defaults to unset, which disables admin authentication entirely
	#[serde()]
	#[config_demo("change-me")]
	pub password: Option<String>,

	/// Optional role an authenticated caller must hold
	/// Defaults to "super-admin"
	#[serde()]
	#[config_demo("super-admin")]
	pub required_role: Option<String>,

	/// Optional flag to disable every admin endpoint outright
	/// Defaults to false
	#[serde()]
	#[config_demo("false")]
	pub disabled: Option<bool>,
}

/// Helper methods for merging partial `AdminConfig` values.
impl AdminConfig {
	pub fn override_optional_username(&mut self, username: &Option<String>) {
		if username.is_some() {
			self.username.clone_from(username);
		}
	}
	pub fn override_optional_password(&mut self, password: &Option<String>) {
		if password.is_some() {
			self.password.clone_from(password);
		}
	}
	pub fn override_optional_required_role(&mut self, required_role: &Option<String>) {
		if required_role.is_some() {
			self.required_role.clone_from(required_role);
		}
	}
	pub fn override_optional_disabled(&mut self, disabled: &Option<bool>) {
		if disabled.is_some() {
			self.disabled = *disabled;
		}
	}
}
