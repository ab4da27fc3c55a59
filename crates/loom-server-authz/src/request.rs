// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing description of an access attempt.

use loom_policy_core::{AttributeValue, Request};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// What the caller wants to do, to which resource.
///
/// Built fluently and handed to
/// [`AuthorizationManager::authorize`](crate::AuthorizationManager::authorize):
///
/// ```
/// use loom_server_authz::AccessRequest;
///
/// let request = AccessRequest::new("delete_comment")
/// 	.resource("comments", 123)
/// 	.attribute("owner_id", 42);
/// assert_eq!(request.action(), "delete_comment");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
	action: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	resource_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	resource_identity: Option<AttributeValue>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	attributes: Map<String, AttributeValue>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	relationships: Map<String, AttributeValue>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	extra: Map<String, AttributeValue>,
}

impl AccessRequest {
	pub fn new(action: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			..Self::default()
		}
	}

	/// Sets resource type and identity together.
	pub fn resource(
		self,
		resource_type: impl Into<String>,
		identity: impl Into<AttributeValue>,
	) -> Self {
		self.resource_type(resource_type).resource_identity(identity)
	}

	pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
		self.resource_type = Some(resource_type.into());
		self
	}

	pub fn resource_identity(mut self, identity: impl Into<AttributeValue>) -> Self {
		self.resource_identity = Some(identity.into());
		self
	}

	/// Adds an entry to the resource's attributes.
	pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	/// Adds an entry to the resource's relationships.
	pub fn relationship(
		mut self,
		name: impl Into<String>,
		value: impl Into<AttributeValue>,
	) -> Self {
		self.relationships.insert(name.into(), value.into());
		self
	}

	/// Adds a top-level request attribute outside the well-known keys.
	pub fn extra(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
		self.extra.insert(key.into(), value.into());
		self
	}

	pub fn action(&self) -> &str {
		&self.action
	}

	pub fn get_resource_type(&self) -> Option<&str> {
		self.resource_type.as_deref()
	}

	pub fn get_resource_identity(&self) -> Option<&AttributeValue> {
		self.resource_identity.as_ref()
	}

	pub fn attributes(&self) -> &Map<String, AttributeValue> {
		&self.attributes
	}

	pub fn relationships(&self) -> &Map<String, AttributeValue> {
		&self.relationships
	}

	/// Lowers into the engine's attribute map.
	///
	/// Extras are applied first so they can never shadow a well-known key.
	pub fn to_request(&self) -> Request {
		let mut builder = Request::builder();
		for (key, value) in &self.extra {
			builder = builder.attribute(key.clone(), value.clone());
		}

		builder = builder.action(self.action.clone());
		if !self.attributes.is_empty() {
			builder = builder.resource_attributes(self.attributes.clone());
		}
		if !self.relationships.is_empty() {
			builder = builder.relationships(self.relationships.clone());
		}
		if let Some(resource_type) = &self.resource_type {
			builder = builder.resource_type(resource_type.clone());
		}
		if let Some(identity) = &self.resource_identity {
			builder = builder.resource_identity(identity.clone());
		}
		builder.build()
	}

	/// Everything beyond action/type/identity, reported back on denial.
	pub fn extra_parameters(&self) -> Map<String, AttributeValue> {
		let mut params = self.extra.clone();
		if !self.attributes.is_empty() {
			params.insert(
				loom_policy_core::keys::RESOURCE_ATTRIBUTES.to_string(),
				AttributeValue::Object(self.attributes.clone()),
			);
		}
		if !self.relationships.is_empty() {
			params.insert(
				loom_policy_core::keys::RESOURCE_RELATIONSHIPS.to_string(),
				AttributeValue::Object(self.relationships.clone()),
			);
		}
		params
	}
}
