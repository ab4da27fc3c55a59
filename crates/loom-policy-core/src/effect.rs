// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision primitives: [`Effect`], [`Obligation`], [`Advice`] and [`Decision`].
//!
//! Obligations and advice are both effect-triggered actions. The difference is
//! in how the enforcement point treats failures: an obligation that fails turns
//! a permit into a denial, advice that fails is only logged.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;

/// Outcome of evaluating a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
	Permit,
	Deny,
	/// No rule applied.
	NotApplicable,
	/// Evaluation failed; never to be read as a permit.
	Indeterminate,
}

impl Effect {
	pub fn is_permit(self) -> bool {
		matches!(self, Effect::Permit)
	}

	pub fn is_deny(self) -> bool {
		matches!(self, Effect::Deny)
	}

	/// Returns true for `Permit` and `Deny`.
	pub fn is_decisive(self) -> bool {
		matches!(self, Effect::Permit | Effect::Deny)
	}
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Effect::Permit => "permit",
			Effect::Deny => "deny",
			Effect::NotApplicable => "not_applicable",
			Effect::Indeterminate => "indeterminate",
		};
		write!(f, "{s}")
	}
}

/// Error returned by an [`EffectHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
	message: String,
}

impl HandlerError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// The action behind an obligation or advice.
pub trait EffectHandler: Send + Sync {
	fn handle(&self, ctx: &Context) -> Result<(), HandlerError>;
}

/// Wraps a closure as an [`EffectHandler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
	F: Fn(&Context) -> Result<(), HandlerError> + Send + Sync,
{
	FnHandler(f)
}

/// Closure-backed handler. See [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F> EffectHandler for FnHandler<F>
where
	F: Fn(&Context) -> Result<(), HandlerError> + Send + Sync,
{
	fn handle(&self, ctx: &Context) -> Result<(), HandlerError> {
		(self.0)(ctx)
	}
}

macro_rules! define_effect_action {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Clone)]
		pub struct $name {
			id: String,
			fulfill_on: Effect,
			handler: Arc<dyn EffectHandler>,
		}

		impl $name {
			pub fn new(
				id: impl Into<String>,
				fulfill_on: Effect,
				handler: impl EffectHandler + 'static,
			) -> Self {
				Self {
					id: id.into(),
					fulfill_on,
					handler: Arc::new(handler),
				}
			}

			/// Triggered when the rule yields `Permit`.
			pub fn on_permit(id: impl Into<String>, handler: impl EffectHandler + 'static) -> Self {
				Self::new(id, Effect::Permit, handler)
			}

			/// Triggered when the rule yields `Deny`.
			pub fn on_deny(id: impl Into<String>, handler: impl EffectHandler + 'static) -> Self {
				Self::new(id, Effect::Deny, handler)
			}

			pub fn id(&self) -> &str {
				&self.id
			}

			pub fn fulfill_on(&self) -> Effect {
				self.fulfill_on
			}

			pub fn execute(&self, ctx: &Context) -> Result<(), HandlerError> {
				self.handler.handle(ctx)
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.debug_struct(stringify!($name))
					.field("id", &self.id)
					.field("fulfill_on", &self.fulfill_on)
					.finish_non_exhaustive()
			}
		}

		impl PartialEq for $name {
			fn eq(&self, other: &Self) -> bool {
				self.id == other.id
					&& self.fulfill_on == other.fulfill_on
					&& Arc::ptr_eq(&self.handler, &other.handler)
			}
		}
	};
}

define_effect_action!(
	Obligation,
	"Mandatory effect-triggered action; failure makes the outcome a denial."
);
define_effect_action!(
	Advice,
	"Best-effort effect-triggered action; failure is logged and ignored."
);

/// Result of evaluating a node against a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
	pub effect: Effect,
	/// Obligations to run, in declaration order.
	pub obligations: Vec<Obligation>,
	/// Advice to run, in declaration order.
	pub advice: Vec<Advice>,
	/// Why the decision is `Indeterminate`. Meant for logs, not for callers.
	pub cause: Option<String>,
}

impl Decision {
	pub fn new(effect: Effect) -> Self {
		Self {
			effect,
			obligations: Vec::new(),
			advice: Vec::new(),
			cause: None,
		}
	}

	pub fn permit() -> Self {
		Self::new(Effect::Permit)
	}

	pub fn deny() -> Self {
		Self::new(Effect::Deny)
	}

	pub fn not_applicable() -> Self {
		Self::new(Effect::NotApplicable)
	}

	pub fn indeterminate(cause: impl Into<String>) -> Self {
		Self {
			cause: Some(cause.into()),
			..Self::new(Effect::Indeterminate)
		}
	}

	pub fn with_obligations(mut self, obligations: impl IntoIterator<Item = Obligation>) -> Self {
		self.obligations.extend(obligations);
		self
	}

	pub fn with_advice(mut self, advice: impl IntoIterator<Item = Advice>) -> Self {
		self.advice.extend(advice);
		self
	}

	pub fn is_permit(&self) -> bool {
		self.effect.is_permit()
	}

	/// Appends `other`'s obligations and advice to this decision.
	pub(crate) fn absorb(&mut self, other: Decision) {
		self.obligations.extend(other.obligations);
		self.advice.extend(other.advice);
	}
}
