// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applicability gates: [`Match`], [`AllOf`], [`AnyOf`] and [`Target`].
//!
//! Matching is a pure predicate over attributes already present in the
//! [`Request`]. It never evaluates conditions and never runs obligations.
//!
//! # Null semantics
//!
//! A [`Match`] whose expected value is `null` matches when the designated
//! attribute is absent *or* explicitly `null`. Any other expected value
//! matches only a present attribute that is structurally equal to it, so the
//! integer `123` does not match the string `"123"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attribute::{keys, AttributeValue, Request};
use crate::context::Context;

/// Selects the attribute a [`Match`] compares against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Designator {
	/// A top-level request key.
	Request(String),
	/// An entry inside `resource-attributes`.
	ResourceAttribute(String),
	/// An entry inside `resource-relationships`.
	ResourceRelationship(String),
}

impl Designator {
	pub fn resolve<'a>(&self, request: &'a Request) -> Option<&'a AttributeValue> {
		match self {
			Designator::Request(key) => request.get(key),
			Designator::ResourceAttribute(name) => request.resource_attribute(name),
			Designator::ResourceRelationship(name) => request.resource_relationship(name),
		}
	}
}

/// Single equality test of one attribute against an expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
	pub designator: Designator,
	pub expected: AttributeValue,
}

impl Match {
	pub fn with_designator(designator: Designator, expected: impl Into<AttributeValue>) -> Self {
		Self {
			designator,
			expected: expected.into(),
		}
	}

	/// Matches a top-level request key.
	pub fn new(key: impl Into<String>, expected: impl Into<AttributeValue>) -> Self {
		Self::with_designator(Designator::Request(key.into()), expected)
	}

	pub fn action(action: impl Into<String>) -> Self {
		Self::new(keys::ACTION, Value::String(action.into()))
	}

	pub fn resource_type(resource_type: impl Into<String>) -> Self {
		Self::new(keys::RESOURCE_TYPE, Value::String(resource_type.into()))
	}

	pub fn resource_attribute(
		name: impl Into<String>,
		expected: impl Into<AttributeValue>,
	) -> Self {
		Self::with_designator(Designator::ResourceAttribute(name.into()), expected)
	}

	pub fn relationship(name: impl Into<String>, expected: impl Into<AttributeValue>) -> Self {
		Self::with_designator(Designator::ResourceRelationship(name.into()), expected)
	}

	/// Matches when the request key is absent or explicitly null.
	pub fn absent(key: impl Into<String>) -> Self {
		Self::new(key, Value::Null)
	}

	pub fn matches(&self, ctx: &Context) -> bool {
		self.matches_request(ctx.request())
	}

	pub fn matches_request(&self, request: &Request) -> bool {
		match (self.designator.resolve(request), &self.expected) {
			(None, Value::Null) => true,
			(None, _) => false,
			(Some(actual), expected) => actual == expected,
		}
	}
}

/// Conjunction of [`Match`]es. An empty `AllOf` is vacuously true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllOf(pub Vec<Match>);

impl AllOf {
	pub fn new(matches: impl IntoIterator<Item = Match>) -> Self {
		Self(matches.into_iter().collect())
	}

	pub fn matches(&self, ctx: &Context) -> bool {
		self.0.iter().all(|m| m.matches(ctx))
	}
}

/// Disjunction of [`AllOf`]s.
///
/// On its own an empty `AnyOf` is false; [`Target`] gives the empty case its
/// "applies to everything" meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyOf(pub Vec<AllOf>);

impl AnyOf {
	pub fn new(all_ofs: impl IntoIterator<Item = AllOf>) -> Self {
		Self(all_ofs.into_iter().collect())
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn matches(&self, ctx: &Context) -> bool {
		self.0.iter().any(|all| all.matches(ctx))
	}
}

/// Decides whether a rule, policy or policy set applies to a context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
	any_of: AnyOf,
}

impl Target {
	pub fn new(any_of: AnyOf) -> Self {
		Self { any_of }
	}

	/// The unconstrained target; matches every context.
	pub fn any() -> Self {
		Self::default()
	}

	/// Target requiring every match in `matches`.
	pub fn all_of(matches: impl IntoIterator<Item = Match>) -> Self {
		Self::new(AnyOf(vec![AllOf::new(matches)]))
	}

	/// Target requiring a single match.
	pub fn matching(m: Match) -> Self {
		Self::all_of([m])
	}

	pub fn is_unconstrained(&self) -> bool {
		self.any_of.is_empty()
	}

	pub fn any_of(&self) -> &AnyOf {
		&self.any_of
	}

	pub fn matches(&self, ctx: &Context) -> bool {
		self.is_unconstrained() || self.any_of.matches(ctx)
	}
}
