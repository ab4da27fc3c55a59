// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for enforced authorization decisions.
//!
//! Every call to [`AuthorizationManager::authorize`](crate::AuthorizationManager::authorize)
//! produces one [`AuthzAuditEvent`], handed to the configured [`AuditSink`].

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use loom_policy_core::{AttributeValue, Effect, TreeVersion};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DenialReason;

/// Tracing target used by [`TracingAuditSink`].
pub const AUDIT_TARGET: &str = "loom_authz::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzEventType {
	/// The request was permitted and every obligation ran.
	AccessGranted,
	/// The request was refused for any reason.
	AccessDenied,
}

impl std::fmt::Display for AuthzEventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			AuthzEventType::AccessGranted => "access_granted",
			AuthzEventType::AccessDenied => "access_denied",
		};
		write!(f, "{s}")
	}
}

/// A single enforced decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthzAuditEvent {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuthzEventType,
	pub action: String,
	pub resource_type: Option<String>,
	pub resource_identity: Option<AttributeValue>,
	/// Id of the requesting principal, when one was known.
	pub principal_id: Option<String>,
	/// Effect returned by the decision point, before obligations ran.
	pub effect: Effect,
	pub reason: Option<DenialReason>,
	/// Version of the policy tree that produced the decision.
	pub tree_version: u64,
}

impl AuthzAuditEvent {
	pub fn builder(
		event_type: AuthzEventType,
		action: impl Into<String>,
	) -> AuthzAuditEventBuilder {
		AuthzAuditEventBuilder::new(event_type, action)
	}

	pub fn is_granted(&self) -> bool {
		self.event_type == AuthzEventType::AccessGranted
	}
}

#[derive(Debug, Clone)]
pub struct AuthzAuditEventBuilder {
	event_type: AuthzEventType,
	action: String,
	resource_type: Option<String>,
	resource_identity: Option<AttributeValue>,
	principal_id: Option<String>,
	effect: Effect,
	reason: Option<DenialReason>,
	tree_version: u64,
}

impl AuthzAuditEventBuilder {
	pub fn new(event_type: AuthzEventType, action: impl Into<String>) -> Self {
		let effect = match event_type {
			AuthzEventType::AccessGranted => Effect::Permit,
			AuthzEventType::AccessDenied => Effect::Deny,
		};
		Self {
			event_type,
			action: action.into(),
			resource_type: None,
			resource_identity: None,
			principal_id: None,
			effect,
			reason: None,
			tree_version: 0,
		}
	}

	pub fn resource(
		mut self,
		resource_type: Option<String>,
		identity: Option<AttributeValue>,
	) -> Self {
		self.resource_type = resource_type;
		self.resource_identity = identity;
		self
	}

	pub fn principal(mut self, principal_id: impl Into<String>) -> Self {
		self.principal_id = Some(principal_id.into());
		self
	}

	pub fn effect(mut self, effect: Effect) -> Self {
		self.effect = effect;
		self
	}

	pub fn reason(mut self, reason: DenialReason) -> Self {
		self.reason = Some(reason);
		self
	}

	pub fn tree_version(mut self, version: TreeVersion) -> Self {
		self.tree_version = version.get();
		self
	}

	pub fn build(self) -> AuthzAuditEvent {
		AuthzAuditEvent {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			action: self.action,
			resource_type: self.resource_type,
			resource_identity: self.resource_identity,
			principal_id: self.principal_id,
			effect: self.effect,
			reason: self.reason,
			tree_version: self.tree_version,
		}
	}
}

/// Destination for audit events. Must not block for long; it runs on the
/// caller's thread.
pub trait AuditSink: Send + Sync {
	fn record(&self, event: &AuthzAuditEvent);
}

/// Emits events as structured tracing records on [`AUDIT_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
	fn record(&self, event: &AuthzAuditEvent) {
		let resource_identity = event.resource_identity.as_ref().map(|v| v.to_string());
		let reason = event.reason.as_ref().map(|r| r.to_string());
		match event.event_type {
			AuthzEventType::AccessGranted => info!(
				target: AUDIT_TARGET,
				audit_id = %event.id,
				event_type = %event.event_type,
				action = %event.action,
				resource_type = event.resource_type.as_deref(),
				resource_identity = resource_identity.as_deref(),
				principal_id = event.principal_id.as_deref(),
				effect = %event.effect,
				tree_version = event.tree_version,
				"access granted"
			),
			AuthzEventType::AccessDenied => warn!(
				target: AUDIT_TARGET,
				audit_id = %event.id,
				event_type = %event.event_type,
				action = %event.action,
				resource_type = event.resource_type.as_deref(),
				resource_identity = resource_identity.as_deref(),
				principal_id = event.principal_id.as_deref(),
				effect = %event.effect,
				reason = reason.as_deref(),
				tree_version = event.tree_version,
				"access denied"
			),
		}
	}
}

/// Keeps events in memory. Useful in tests and for short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
	events: Mutex<Vec<AuthzAuditEvent>>,
}

impl MemoryAuditSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of recorded events, oldest first.
	pub fn events(&self) -> Vec<AuthzAuditEvent> {
		match self.events.lock() {
			Ok(events) => events.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn len(&self) -> usize {
		self.events().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl AuditSink for MemoryAuditSink {
	fn record(&self, event: &AuthzAuditEvent) {
		let mut events = match self.events.lock() {
			Ok(events) => events,
			Err(poisoned) => poisoned.into_inner(),
		};
		events.push(event.clone());
	}
}
