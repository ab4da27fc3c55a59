// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Combining algorithms reduce sibling decisions into one.
//!
//! The same algorithms apply to rules within a policy and to children of a
//! policy set. Children are supplied as a lazy iterator: `first-applicable`
//! stops pulling once it has a result, so later children are never evaluated.
//!
//! Obligations and advice are carried only from children whose own effect
//! equals the combined effect. Overridden branches contribute nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::effect::{Decision, Effect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningAlgorithm {
	/// First child that is not `NotApplicable` wins, `Indeterminate` included.
	FirstApplicable,
	/// Permit > Indeterminate > Deny > NotApplicable.
	PermitOverrides,
	/// Deny > Indeterminate > Permit > NotApplicable.
	DenyOverrides,
	/// Permit if any child permits, otherwise Deny.
	DenyUnlessPermit,
	/// Deny if any child denies, otherwise Permit.
	PermitUnlessDeny,
}

impl CombiningAlgorithm {
	/// Whether the algorithm yields a decisive effect with no children at all.
	pub fn has_default(self) -> bool {
		matches!(
			self,
			CombiningAlgorithm::DenyUnlessPermit | CombiningAlgorithm::PermitUnlessDeny
		)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			CombiningAlgorithm::FirstApplicable => "first-applicable",
			CombiningAlgorithm::PermitOverrides => "permit-overrides",
			CombiningAlgorithm::DenyOverrides => "deny-overrides",
			CombiningAlgorithm::DenyUnlessPermit => "deny-unless-permit",
			CombiningAlgorithm::PermitUnlessDeny => "permit-unless-deny",
		}
	}

	/// Reduces `children`, in order, into a single decision.
	pub fn combine<I>(self, children: I) -> Decision
	where
		I: IntoIterator<Item = Decision>,
	{
		match self {
			CombiningAlgorithm::FirstApplicable => first_applicable(children),
			CombiningAlgorithm::PermitOverrides => {
				let tally = Tally::collect(children);
				if tally.permit.is_some() {
					tally.take(Effect::Permit)
				} else if tally.indeterminate.is_some() {
					tally.take(Effect::Indeterminate)
				} else if tally.deny.is_some() {
					tally.take(Effect::Deny)
				} else {
					Decision::not_applicable()
				}
			}
			CombiningAlgorithm::DenyOverrides => {
				let tally = Tally::collect(children);
				if tally.deny.is_some() {
					tally.take(Effect::Deny)
				} else if tally.indeterminate.is_some() {
					tally.take(Effect::Indeterminate)
				} else if tally.permit.is_some() {
					tally.take(Effect::Permit)
				} else {
					Decision::not_applicable()
				}
			}
			CombiningAlgorithm::DenyUnlessPermit => {
				let tally = Tally::collect(children);
				if tally.permit.is_some() {
					tally.take(Effect::Permit)
				} else {
					tally.take(Effect::Deny)
				}
			}
			CombiningAlgorithm::PermitUnlessDeny => {
				let tally = Tally::collect(children);
				if tally.deny.is_some() {
					tally.take(Effect::Deny)
				} else {
					tally.take(Effect::Permit)
				}
			}
		}
	}
}

impl fmt::Display for CombiningAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn first_applicable<I>(children: I) -> Decision
where
	I: IntoIterator<Item = Decision>,
{
	children
		.into_iter()
		.find(|d| d.effect != Effect::NotApplicable)
		.unwrap_or_else(Decision::not_applicable)
}

/// Per-effect accumulation of every child decision.
#[derive(Default)]
struct Tally {
	permit: Option<Decision>,
	deny: Option<Decision>,
	indeterminate: Option<Decision>,
}

impl Tally {
	fn collect<I>(children: I) -> Self
	where
		I: IntoIterator<Item = Decision>,
	{
		let mut tally = Tally::default();
		for child in children {
			let slot = match child.effect {
				Effect::Permit => &mut tally.permit,
				Effect::Deny => &mut tally.deny,
				Effect::Indeterminate => &mut tally.indeterminate,
				Effect::NotApplicable => continue,
			};
			if let Some(acc) = slot.as_mut() {
				acc.absorb(child);
			} else {
				*slot = Some(child);
			}
		}
		tally
	}

	/// Produces the combined decision for `effect`, keeping only the payload
	/// of children that had that effect. `Indeterminate` keeps the first cause.
	fn take(self, effect: Effect) -> Decision {
		let slot = match effect {
			Effect::Permit => self.permit,
			Effect::Deny => self.deny,
			Effect::Indeterminate => self.indeterminate,
			Effect::NotApplicable => None,
		};
		match slot {
			Some(decision) => decision,
			None => Decision::new(effect),
		}
	}
}
