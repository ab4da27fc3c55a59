// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Arena-backed policy tree and its recursive evaluation.
//!
//! Every rule, policy and policy set lives in one flat node table and refers
//! to its children by [`NodeId`]. A built [`PolicyTree`] is immutable, so it
//! can be shared across threads behind an `Arc` without locking.
//!
//! # Rule evaluation
//!
//! ```text
//! target matches? ──no──▶ NotApplicable
//!      │yes
//! condition? ──false──▶ NotApplicable
//!      │       └─error──▶ Indeterminate
//!      │true / none
//! effect (+ obligations/advice whose trigger equals it)
//! ```
//!
//! Policies and policy sets first check their own target, then hand their
//! children, lazily and in declaration order, to their combining algorithm.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combining::CombiningAlgorithm;
use crate::condition::{Condition, ConditionError};
use crate::context::Context;
use crate::effect::{Advice, Decision, Effect, Obligation};
use crate::target::Target;

/// Index of a node in a [`PolicyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
	pub(crate) fn new(index: u32) -> Self {
		Self(index)
	}

	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Process-unique version stamped on every built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeVersion(u64);

impl TreeVersion {
	fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for TreeVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "v{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	PolicySet,
	Policy,
	Rule,
}

impl fmt::Display for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			NodeKind::PolicySet => "policy set",
			NodeKind::Policy => "policy",
			NodeKind::Rule => "rule",
		};
		write!(f, "{s}")
	}
}

/// Computes a rule's effect at evaluation time.
///
/// Returning `NotApplicable` makes the rule not applicable; an error or
/// `Indeterminate` makes it indeterminate.
pub trait EffectProducer: Send + Sync {
	fn produce(&self, ctx: &Context) -> Result<Effect, ConditionError>;
}

/// Wraps a closure as an [`EffectProducer`].
pub fn producer_fn<F>(f: F) -> FnProducer<F>
where
	F: Fn(&Context) -> Result<Effect, ConditionError> + Send + Sync,
{
	FnProducer(f)
}

/// Closure-backed producer. See [`producer_fn`].
pub struct FnProducer<F>(F);

impl<F> EffectProducer for FnProducer<F>
where
	F: Fn(&Context) -> Result<Effect, ConditionError> + Send + Sync,
{
	fn produce(&self, ctx: &Context) -> Result<Effect, ConditionError> {
		(self.0)(ctx)
	}
}

/// How a rule arrives at its effect.
#[derive(Clone)]
pub enum RuleEffect {
	Fixed(Effect),
	Producer(Arc<dyn EffectProducer>),
}

impl fmt::Debug for RuleEffect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RuleEffect::Fixed(effect) => f.debug_tuple("Fixed").field(effect).finish(),
			RuleEffect::Producer(_) => f.write_str("Producer(..)"),
		}
	}
}

pub struct RuleNode {
	pub name: String,
	pub target: Target,
	pub condition: Option<Arc<dyn Condition>>,
	pub effect: RuleEffect,
	pub obligations: Vec<Obligation>,
	pub advice: Vec<Advice>,
}

impl fmt::Debug for RuleNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RuleNode")
			.field("name", &self.name)
			.field("target", &self.target)
			.field("condition", &self.condition.as_ref().map(|c| c.name()))
			.field("effect", &self.effect)
			.field("obligations", &self.obligations)
			.field("advice", &self.advice)
			.finish()
	}
}

#[derive(Debug)]
pub struct PolicyNode {
	pub name: String,
	pub target: Target,
	pub algorithm: CombiningAlgorithm,
	pub rules: Vec<NodeId>,
}

#[derive(Debug)]
pub struct PolicySetNode {
	pub name: String,
	pub target: Target,
	pub algorithm: CombiningAlgorithm,
	/// Policies and nested policy sets.
	pub children: Vec<NodeId>,
}

#[derive(Debug)]
pub enum Node {
	PolicySet(PolicySetNode),
	Policy(PolicyNode),
	Rule(RuleNode),
}

impl Node {
	pub fn name(&self) -> &str {
		match self {
			Node::PolicySet(n) => &n.name,
			Node::Policy(n) => &n.name,
			Node::Rule(n) => &n.name,
		}
	}

	pub fn kind(&self) -> NodeKind {
		match self {
			Node::PolicySet(_) => NodeKind::PolicySet,
			Node::Policy(_) => NodeKind::Policy,
			Node::Rule(_) => NodeKind::Rule,
		}
	}

	pub fn target(&self) -> &Target {
		match self {
			Node::PolicySet(n) => &n.target,
			Node::Policy(n) => &n.target,
			Node::Rule(n) => &n.target,
		}
	}

	/// Child ids in declaration order; empty for rules.
	pub fn children(&self) -> &[NodeId] {
		match self {
			Node::PolicySet(n) => &n.children,
			Node::Policy(n) => &n.rules,
			Node::Rule(_) => &[],
		}
	}
}

/// Immutable, validated policy tree. Built with
/// [`PolicySetBuilder`](crate::builder::PolicySetBuilder).
#[derive(Debug)]
pub struct PolicyTree {
	nodes: Vec<Node>,
	root: NodeId,
	version: TreeVersion,
}

impl PolicyTree {
	pub(crate) fn from_parts(nodes: Vec<Node>, root: NodeId) -> Self {
		Self {
			nodes,
			root,
			version: TreeVersion::next(),
		}
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn version(&self) -> TreeVersion {
		self.version
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id.index())
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Evaluates the whole tree from the root.
	pub fn evaluate(&self, ctx: &Context) -> Decision {
		self.evaluate_node(self.root, ctx)
	}

	/// Evaluates the subtree rooted at `id`.
	pub fn evaluate_node(&self, id: NodeId, ctx: &Context) -> Decision {
		let Some(node) = self.node(id) else {
			return Decision::indeterminate(format!("unknown node {id}"));
		};

		let decision = match node {
			Node::Rule(rule) => evaluate_rule(rule, ctx),
			Node::Policy(policy) => {
				self.evaluate_children(&policy.target, policy.algorithm, &policy.rules, ctx)
			}
			Node::PolicySet(set) => {
				self.evaluate_children(&set.target, set.algorithm, &set.children, ctx)
			}
		};

		debug!(
			node = %id,
			kind = %node.kind(),
			name = node.name(),
			effect = %decision.effect,
			"policy node evaluated"
		);
		decision
	}

	fn evaluate_children(
		&self,
		target: &Target,
		algorithm: CombiningAlgorithm,
		children: &[NodeId],
		ctx: &Context,
	) -> Decision {
		if !target.matches(ctx) {
			return Decision::not_applicable();
		}
		algorithm.combine(children.iter().map(|&child| self.evaluate_node(child, ctx)))
	}
}

fn evaluate_rule(rule: &RuleNode, ctx: &Context) -> Decision {
	if !rule.target.matches(ctx) {
		return Decision::not_applicable();
	}

	if let Some(condition) = &rule.condition {
		match condition.evaluate(ctx) {
			Ok(true) => {}
			Ok(false) => return Decision::not_applicable(),
			Err(e) => {
				return Decision::indeterminate(format!(
					"rule '{}': condition '{}' failed: {e}",
					rule.name,
					condition.name()
				))
			}
		}
	}

	let effect = match &rule.effect {
		RuleEffect::Fixed(effect) => *effect,
		RuleEffect::Producer(producer) => match producer.produce(ctx) {
			Ok(effect) => effect,
			Err(e) => {
				return Decision::indeterminate(format!(
					"rule '{}': effect producer failed: {e}",
					rule.name
				))
			}
		},
	};

	match effect {
		Effect::Permit | Effect::Deny => Decision::new(effect)
			.with_obligations(
				rule
					.obligations
					.iter()
					.filter(|o| o.fulfill_on() == effect)
					.cloned(),
			)
			.with_advice(
				rule
					.advice
					.iter()
					.filter(|a| a.fulfill_on() == effect)
					.cloned(),
			),
		Effect::NotApplicable => Decision::not_applicable(),
		Effect::Indeterminate => {
			Decision::indeterminate(format!(
				"rule '{}': effect producer was indeterminate",
				rule.name
			))
		}
	}
}
