// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation context: a [`Request`] plus the host-supplied environment.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::attribute::{AttributeValue, Request};

/// Named, opaque references supplied by the host application.
///
/// Entries are type-erased and shared; conditions recover them with
/// [`Environment::get`] using the concrete type they were inserted as.
#[derive(Clone, Default)]
pub struct Environment {
	entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Environment {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: insert `value` under `key`.
	pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
		self.entries.insert(key.into(), Arc::new(value));
	}

	/// Returns the entry under `key` if it exists and was inserted as a `T`.
	pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
		self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Copies every entry of `other` into `self`; `other` wins on conflicts.
	pub fn extend(&mut self, other: &Environment) {
		for (key, value) in &other.entries {
			self.entries.insert(key.clone(), Arc::clone(value));
		}
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut keys: Vec<&str> = self.keys().collect();
		keys.sort_unstable();
		f.debug_struct("Environment").field("keys", &keys).finish()
	}
}

/// Read-only view handed to targets, conditions and effect handlers.
#[derive(Debug, Clone, Default)]
pub struct Context {
	request: Request,
	environment: Environment,
}

impl Context {
	pub fn new(request: Request, environment: Environment) -> Self {
		Self {
			request,
			environment,
		}
	}

	pub fn from_request(request: Request) -> Self {
		Self::new(request, Environment::default())
	}

	pub fn request(&self) -> &Request {
		&self.request
	}

	pub fn environment(&self) -> &Environment {
		&self.environment
	}

	/// Shorthand for `self.request().get(key)`.
	pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
		self.request.get(key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct Handle(u32);

	#[test]
	fn get_returns_typed_entry() {
		let env = Environment::new().with("handle", Handle(7));
		assert_eq!(env.get::<Handle>("handle"), Some(&Handle(7)));
	}

	#[test]
	fn get_with_wrong_type_is_none() {
		let env = Environment::new().with("handle", Handle(7));
		assert!(env.contains("handle"));
		assert_eq!(env.get::<String>("handle"), None);
	}

	#[test]
	fn extend_overrides_existing_keys() {
		let mut base = Environment::new()
			.with("a", 1u32)
			.with("b", 2u32);
		let overrides = Environment::new().with("b", 20u32);
		base.extend(&overrides);

		assert_eq!(base.get::<u32>("a"), Some(&1));
		assert_eq!(base.get::<u32>("b"), Some(&20));
		assert_eq!(base.len(), 2);
	}

	#[test]
	fn debug_lists_sorted_keys_only() {
		let env = Environment::new().with("z", 1u8).with("a", 2u8);
		assert_eq!(format!("{env:?}"), r#"Environment { keys: ["a", "z"] }"#);
	}

	#[test]
	fn context_exposes_request_attributes() {
		let request = Request::builder().action("read").build();
		let ctx = Context::from_request(request);
		assert_eq!(ctx.attribute("action"), Some(&serde_json::json!("read")));
		assert!(ctx.environment().is_empty());
	}

	#[test]
	fn context_is_shareable_across_threads() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<Context>();
	}
}
