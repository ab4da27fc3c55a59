// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The requesting principal, as seen by conditions.
//!
//! The host publishes a [`PrincipalAccessor`] in the evaluation environment
//! under [`PRINCIPAL_ENV_KEY`]. Conditions call [`current_principal`] to fetch
//! it; the engine itself never knows how principals are resolved.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use loom_policy_core::{AttributeValue, ConditionError, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment key under which the principal accessor is published.
pub const PRINCIPAL_ENV_KEY: &str = "principal";

/// Role name treated as administrator by the built-in conditions.
pub const ADMIN_ROLE: &str = "admin";

/// Opaque identifier of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true if `value` names this principal.
	///
	/// Strings compare verbatim; numbers compare by their decimal rendering so
	/// an integer owner id matches the same id held as a string.
	pub fn matches_value(&self, value: &AttributeValue) -> bool {
		match value {
			Value::String(s) => *s == self.0,
			Value::Number(n) => n.to_string() == self.0,
			_ => false,
		}
	}
}

impl fmt::Display for PrincipalId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for PrincipalId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for PrincipalId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Attributes describing the principal making a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
	pub id: PrincipalId,
	pub roles: Vec<String>,
	#[serde(default)]
	pub attributes: BTreeMap<String, AttributeValue>,
}

impl Principal {
	/// Creates a principal with no roles or attributes.
	pub fn new(id: impl Into<PrincipalId>) -> Self {
		Self {
			id: id.into(),
			roles: Vec::new(),
			attributes: BTreeMap::new(),
		}
	}

	/// Builder: add a role.
	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.roles.push(role.into());
		self
	}

	/// Builder: set an attribute.
	pub fn with_attribute(
		mut self,
		key: impl Into<String>,
		value: impl Into<AttributeValue>,
	) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r == role)
	}

	pub fn is_admin(&self) -> bool {
		self.has_role(ADMIN_ROLE)
	}
}

/// Resolves the principal behind the current call.
///
/// `None` means the call is anonymous.
pub trait PrincipalAccessor: Send + Sync {
	fn current_principal(&self) -> Option<Principal>;
}

impl<F> PrincipalAccessor for F
where
	F: Fn() -> Option<Principal> + Send + Sync,
{
	fn current_principal(&self) -> Option<Principal> {
		self()
	}
}

/// Accessor returning a fixed principal; typically built per request.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipal(Option<Principal>);

impl StaticPrincipal {
	pub fn new(principal: Principal) -> Self {
		Self(Some(principal))
	}

	pub fn anonymous() -> Self {
		Self(None)
	}
}

impl PrincipalAccessor for StaticPrincipal {
	fn current_principal(&self) -> Option<Principal> {
		self.0.clone()
	}
}

/// The shared handle stored in the environment.
pub type SharedPrincipalAccessor = Arc<dyn PrincipalAccessor>;

/// Fetches the current principal from `ctx`'s environment.
///
/// Fails when no accessor was published: that is a wiring error and must make
/// the calling condition indeterminate rather than silently anonymous.
pub fn current_principal(ctx: &Context) -> Result<Option<Principal>, ConditionError> {
	ctx
		.environment()
		.get::<SharedPrincipalAccessor>(PRINCIPAL_ENV_KEY)
		.map(|accessor| accessor.current_principal())
		.ok_or_else(|| ConditionError::missing_environment(PRINCIPAL_ENV_KEY))
}
