// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy Decision Point.
//!
//! A thin, shareable wrapper around an immutable [`PolicyTree`]. There is no
//! process-wide instance: construct one at startup and pass it to whatever
//! needs decisions.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::context::Context;
use crate::effect::{Decision, Effect};
use crate::tree::{PolicyTree, TreeVersion};

/// Evaluates `root` against `ctx`.
pub fn evaluate(root: &PolicyTree, ctx: &Context) -> Decision {
	root.evaluate(ctx)
}

#[derive(Debug, Clone)]
pub struct PolicyDecisionPoint {
	tree: Arc<PolicyTree>,
}

impl PolicyDecisionPoint {
	pub fn new(tree: PolicyTree) -> Self {
		Self {
			tree: Arc::new(tree),
		}
	}

	pub fn from_shared(tree: Arc<PolicyTree>) -> Self {
		Self { tree }
	}

	pub fn tree(&self) -> &PolicyTree {
		&self.tree
	}

	pub fn version(&self) -> TreeVersion {
		self.tree.version()
	}

	/// Evaluates the root policy set against `ctx`.
	#[instrument(
		level = "debug",
		skip(self, ctx),
		fields(
			action = ctx.request().action().unwrap_or_default(),
			resource_type = ctx.request().resource_type().unwrap_or_default(),
			tree_version = %self.tree.version(),
		)
	)]
	pub fn evaluate(&self, ctx: &Context) -> Decision {
		let decision = evaluate(&self.tree, ctx);
		if decision.effect == Effect::Indeterminate {
			warn!(
				cause = decision.cause.as_deref().unwrap_or("unknown"),
				"policy evaluation was indeterminate"
			);
		}
		decision
	}
}
