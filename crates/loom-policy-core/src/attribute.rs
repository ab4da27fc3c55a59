// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The flat attribute map a decision is made against.
//!
//! A [`Request`] is assembled once per authorization call and never mutated
//! afterwards. A handful of keys are well known to the engine (see [`keys`]);
//! everything else is free-form and only meaningful to the targets and
//! conditions that reference it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value type for every attribute in a [`Request`].
pub type AttributeValue = Value;

/// Well-known attribute keys.
pub mod keys {
	/// The action being attempted, e.g. `delete_comment`.
	pub const ACTION: &str = "action";
	/// The type of the resource, e.g. `comments`.
	pub const RESOURCE_TYPE: &str = "resource-type";
	/// The identity of the resource, a string or an integer.
	pub const RESOURCE_IDENTITY: &str = "resource-identity";
	/// Object of resource attributes (owner, visibility, ...).
	pub const RESOURCE_ATTRIBUTES: &str = "resource-attributes";
	/// Object of resource relationships (parent thread, org, ...).
	pub const RESOURCE_RELATIONSHIPS: &str = "resource-relationships";
}

/// Immutable attribute map for a single authorization call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request {
	attributes: BTreeMap<String, AttributeValue>,
}

impl Request {
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// Returns the attribute stored under `key`, if any.
	pub fn get(&self, key: &str) -> Option<&AttributeValue> {
		self.attributes.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.attributes.contains_key(key)
	}

	pub fn action(&self) -> Option<&str> {
		self.get(keys::ACTION).and_then(Value::as_str)
	}

	pub fn resource_type(&self) -> Option<&str> {
		self.get(keys::RESOURCE_TYPE).and_then(Value::as_str)
	}

	pub fn resource_identity(&self) -> Option<&AttributeValue> {
		self.get(keys::RESOURCE_IDENTITY).filter(|v| !v.is_null())
	}

	/// Looks up `name` inside the `resource-attributes` object.
	pub fn resource_attribute(&self, name: &str) -> Option<&AttributeValue> {
		self
			.get(keys::RESOURCE_ATTRIBUTES)
			.and_then(Value::as_object)
			.and_then(|attrs| attrs.get(name))
	}

	/// Looks up `name` inside the `resource-relationships` object.
	pub fn resource_relationship(&self, name: &str) -> Option<&AttributeValue> {
		self
			.get(keys::RESOURCE_RELATIONSHIPS)
			.and_then(Value::as_object)
			.and_then(|rels| rels.get(name))
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
		self.attributes.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.attributes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.attributes.is_empty()
	}
}

/// Builder for [`Request`]. The only way to populate one.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
	attributes: BTreeMap<String, AttributeValue>,
}

impl RequestBuilder {
	pub fn action(self, action: impl Into<String>) -> Self {
		self.attribute(keys::ACTION, Value::String(action.into()))
	}

	pub fn resource_type(self, resource_type: impl Into<String>) -> Self {
		self.attribute(keys::RESOURCE_TYPE, Value::String(resource_type.into()))
	}

	pub fn resource_identity(self, identity: impl Into<AttributeValue>) -> Self {
		self.attribute(keys::RESOURCE_IDENTITY, identity.into())
	}

	/// Adds a single entry to the `resource-attributes` object.
	pub fn resource_attribute(
		mut self,
		name: impl Into<String>,
		value: impl Into<AttributeValue>,
	) -> Self {
		self
			.object_entry(keys::RESOURCE_ATTRIBUTES)
			.insert(name.into(), value.into());
		self
	}

	/// Merges `attributes` into the `resource-attributes` object. An empty map
	/// leaves the key absent.
	pub fn resource_attributes(mut self, attributes: Map<String, AttributeValue>) -> Self {
		if attributes.is_empty() {
			return self;
		}
		self.object_entry(keys::RESOURCE_ATTRIBUTES).extend(attributes);
		self
	}

	/// Adds a single entry to the `resource-relationships` object.
	pub fn relationship(
		mut self,
		name: impl Into<String>,
		value: impl Into<AttributeValue>,
	) -> Self {
		self
			.object_entry(keys::RESOURCE_RELATIONSHIPS)
			.insert(name.into(), value.into());
		self
	}

	/// Merges `relationships` into the `resource-relationships` object. An
	/// empty map leaves the key absent.
	pub fn relationships(mut self, relationships: Map<String, AttributeValue>) -> Self {
		if relationships.is_empty() {
			return self;
		}
		self
			.object_entry(keys::RESOURCE_RELATIONSHIPS)
			.extend(relationships);
		self
	}

	/// Sets an arbitrary top-level attribute, replacing any previous value.
	pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	pub fn build(self) -> Request {
		Request {
			attributes: self.attributes,
		}
	}

	fn object_entry(&mut self, key: &str) -> &mut Map<String, AttributeValue> {
		let slot = self
			.attributes
			.entry(key.to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if !slot.is_object() {
			*slot = Value::Object(Map::new());
		}
		match slot {
			Value::Object(map) => map,
			_ => unreachable!("slot was just replaced with an object"),
		}
	}
}
