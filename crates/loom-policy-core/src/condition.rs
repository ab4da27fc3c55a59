// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Boolean predicates evaluated after a rule's target matched.
//!
//! A condition that fails with [`ConditionError`] makes its rule
//! `Indeterminate`; it is never coerced to `false`.

use thiserror::Error;

use crate::context::Context;

/// Error raised while evaluating a condition or an effect producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConditionError {
	message: String,
}

impl ConditionError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	pub fn missing_environment(key: &str) -> Self {
		Self::new(format!("environment entry '{key}' is not available"))
	}

	pub fn missing_attribute(key: &str) -> Self {
		Self::new(format!("attribute '{key}' is not present in the request"))
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Predicate over a [`Context`].
///
/// Implementations must be deterministic and must not have side effects that
/// influence authorization. They may read the context's environment.
pub trait Condition: Send + Sync {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError>;

	/// Name used in logs and indeterminate causes.
	fn name(&self) -> &str {
		"condition"
	}
}

/// Wraps a closure as a [`Condition`].
pub fn from_fn<F>(f: F) -> FnCondition<F>
where
	F: Fn(&Context) -> Result<bool, ConditionError> + Send + Sync,
{
	FnCondition { name: None, f }
}

/// Wraps a closure as a [`Condition`] with a descriptive name.
pub fn named<F>(name: impl Into<String>, f: F) -> FnCondition<F>
where
	F: Fn(&Context) -> Result<bool, ConditionError> + Send + Sync,
{
	FnCondition {
		name: Some(name.into()),
		f,
	}
}

/// Closure-backed condition. See [`from_fn`] and [`named`].
pub struct FnCondition<F> {
	name: Option<String>,
	f: F,
}

impl<F> Condition for FnCondition<F>
where
	F: Fn(&Context) -> Result<bool, ConditionError> + Send + Sync,
{
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		(self.f)(ctx)
	}

	fn name(&self) -> &str {
		self.name.as_deref().unwrap_or("fn")
	}
}

/// Short-circuiting `a && b`.
pub struct And<A, B>(A, B);

/// Short-circuiting `a || b`.
pub struct Or<A, B>(A, B);

/// `!a`.
pub struct Not<A>(A);

impl<A: Condition, B: Condition> Condition for And<A, B> {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		Ok(self.0.evaluate(ctx)? && self.1.evaluate(ctx)?)
	}

	fn name(&self) -> &str {
		"and"
	}
}

impl<A: Condition, B: Condition> Condition for Or<A, B> {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		Ok(self.0.evaluate(ctx)? || self.1.evaluate(ctx)?)
	}

	fn name(&self) -> &str {
		"or"
	}
}

impl<A: Condition> Condition for Not<A> {
	fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
		Ok(!self.0.evaluate(ctx)?)
	}

	fn name(&self) -> &str {
		"not"
	}
}

/// Combinators available on every [`Condition`].
pub trait ConditionExt: Condition + Sized {
	fn and<C: Condition>(self, other: C) -> And<Self, C> {
		And(self, other)
	}

	fn or<C: Condition>(self, other: C) -> Or<Self, C> {
		Or(self, other)
	}

	fn not(self) -> Not<Self> {
		Not(self)
	}
}

impl<T: Condition> ConditionExt for T {}

/// Always true.
pub struct Always;

impl Condition for Always {
	fn evaluate(&self, _ctx: &Context) -> Result<bool, ConditionError> {
		Ok(true)
	}

	fn name(&self) -> &str {
		"always"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	fn constant(value: bool) -> impl Condition {
		from_fn(move |_ctx| Ok(value))
	}

	fn failing() -> impl Condition {
		from_fn(|_ctx| Err(ConditionError::new("boom")))
	}

	fn counting(counter: Arc<AtomicUsize>, value: bool) -> impl Condition {
		from_fn(move |_ctx| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(value)
		})
	}

	#[test]
	fn closure_condition_reads_context() {
		let cond = from_fn(|ctx| Ok(ctx.request().action() == Some("read")));
		let ctx = Context::from_request(crate::Request::builder().action("read").build());
		assert_eq!(cond.evaluate(&ctx), Ok(true));
	}

	#[test]
	fn named_condition_reports_name() {
		let cond = named("is_owner", |_ctx| Ok(true));
		assert_eq!(cond.name(), "is_owner");
		assert_eq!(from_fn(|_ctx| Ok(true)).name(), "fn");
	}

	#[test]
	fn and_short_circuits_on_false() {
		let counter = Arc::new(AtomicUsize::new(0));
		let cond = constant(false).and(counting(counter.clone(), true));
		assert_eq!(cond.evaluate(&Context::default()), Ok(false));
		assert_eq!(counter.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn or_short_circuits_on_true() {
		let counter = Arc::new(AtomicUsize::new(0));
		let cond = constant(true).or(counting(counter.clone(), false));
		assert_eq!(cond.evaluate(&Context::default()), Ok(true));
		assert_eq!(counter.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn or_evaluates_second_operand_when_first_false() {
		let counter = Arc::new(AtomicUsize::new(0));
		let cond = constant(false).or(counting(counter.clone(), true));
		assert_eq!(cond.evaluate(&Context::default()), Ok(true));
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn errors_propagate_through_combinators() {
		let ctx = Context::default();
		assert!(failing().or(constant(true)).evaluate(&ctx).is_err());
		assert!(constant(true).and(failing()).evaluate(&ctx).is_err());
		assert!(failing().not().evaluate(&ctx).is_err());
	}

	#[test]
	fn error_skipped_by_short_circuit_is_not_raised() {
		let ctx = Context::default();
		assert_eq!(constant(true).or(failing()).evaluate(&ctx), Ok(true));
	}

	#[test]
	fn not_inverts() {
		assert_eq!(constant(true).not().evaluate(&Context::default()), Ok(false));
		assert_eq!(Always.evaluate(&Context::default()), Ok(true));
	}

	#[test]
	fn error_helpers_format_messages() {
		assert_eq!(
			ConditionError::missing_environment("principal").to_string(),
			"environment entry 'principal' is not available"
		);
		assert_eq!(
			ConditionError::missing_attribute("owner_id").message(),
			"attribute 'owner_id' is not present in the request"
		);
	}
}
