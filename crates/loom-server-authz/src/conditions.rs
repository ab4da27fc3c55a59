// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ready-made conditions over the current principal.

use loom_policy_core::condition::Or;
use loom_policy_core::{Condition, ConditionError, ConditionExt, Context};

use crate::principal::{current_principal, ADMIN_ROLE};

/// Default resource attribute holding the owner's principal id.
pub const OWNER_ATTRIBUTE: &str = "owner_id";

/// True when the call has a principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAuthenticated;

impl Condition for IsAuthenticated {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		Ok(current_principal(ctx)?.is_some())
	}

	fn name(&self) -> &str {
		"is_authenticated"
	}
}

/// True when the principal holds `role`. Anonymous calls are false.
#[derive(Debug, Clone)]
pub struct HasRole {
	role: String,
	label: String,
}

impl HasRole {
	pub fn new(role: impl Into<String>) -> Self {
		let role = role.into();
		let label = format!("has_role({role})");
		Self { role, label }
	}

	pub fn admin() -> Self {
		Self::new(ADMIN_ROLE)
	}
}

impl Condition for HasRole {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		Ok(current_principal(ctx)?.is_some_and(|p| p.has_role(&self.role)))
	}

	fn name(&self) -> &str {
		&self.label
	}
}

/// True when the principal's id equals the resource's owner attribute.
///
/// A request without the owner attribute (or with a null one) is an error,
/// not `false`.
#[derive(Debug, Clone)]
pub struct IsResourceOwner {
	owner_attribute: String,
}

impl IsResourceOwner {
	pub fn new(owner_attribute: impl Into<String>) -> Self {
		Self {
			owner_attribute: owner_attribute.into(),
		}
	}
}

impl Default for IsResourceOwner {
	fn default() -> Self {
		Self::new(OWNER_ATTRIBUTE)
	}
}

impl Condition for IsResourceOwner {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		let owner = ctx
			.request()
			.resource_attribute(&self.owner_attribute)
			.filter(|v| !v.is_null())
			.ok_or_else(|| ConditionError::missing_attribute(&self.owner_attribute))?;

		Ok(current_principal(ctx)?.is_some_and(|p| p.id.matches_value(owner)))
	}

	fn name(&self) -> &str {
		"is_resource_owner"
	}
}

/// "Requesting principal owns this resource or is an admin".
///
/// The admin check runs first, so admins pass even when the request carries
/// no owner attribute. Anyone else without one is still an error.
pub fn is_owner_or_admin() -> Or<HasRole, IsResourceOwner> {
	HasRole::admin().or(IsResourceOwner::default())
}
