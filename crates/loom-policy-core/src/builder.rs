// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builder API for assembling a [`PolicyTree`] at startup.
//!
//! Builders nest the way the tree does. [`PolicySetBuilder::build`] validates
//! the whole structure and flattens it into the arena in one pass:
//!
//! - names must be non-empty
//! - rule names are unique within their policy
//! - child names are unique within their policy set
//! - an empty policy or policy set needs an algorithm with a default outcome
//!
//! ```
//! use loom_policy_core::{
//! 	CombiningAlgorithm, Match, PolicyBuilder, PolicySetBuilder, RuleBuilder, Target,
//! };
//!
//! let tree = PolicySetBuilder::new("root", CombiningAlgorithm::DenyUnlessPermit)
//! 	.policy(
//! 		PolicyBuilder::new("comments", CombiningAlgorithm::FirstApplicable)
//! 			.target(Target::matching(Match::resource_type("comments")))
//! 			.rule(RuleBuilder::permit("read").target(Target::matching(Match::action("read")))),
//! 	)
//! 	.build()
//! 	.expect("valid policy tree");
//! assert_eq!(tree.len(), 3);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::combining::CombiningAlgorithm;
use crate::condition::Condition;
use crate::effect::{Advice, Effect, Obligation};
use crate::error::{PolicyError, PolicyResult};
use crate::target::Target;
use crate::tree::{
	EffectProducer, Node, NodeId, NodeKind, PolicyNode, PolicySetNode, PolicyTree, RuleEffect,
	RuleNode,
};

const ROOT_SCOPE: &str = "<root>";

pub struct RuleBuilder {
	name: String,
	target: Target,
	condition: Option<Arc<dyn Condition>>,
	effect: RuleEffect,
	obligations: Vec<Obligation>,
	advice: Vec<Advice>,
}

impl RuleBuilder {
	fn with_effect(name: impl Into<String>, effect: RuleEffect) -> Self {
		Self {
			name: name.into(),
			target: Target::any(),
			condition: None,
			effect,
			obligations: Vec::new(),
			advice: Vec::new(),
		}
	}

	pub fn permit(name: impl Into<String>) -> Self {
		Self::with_effect(name, RuleEffect::Fixed(Effect::Permit))
	}

	pub fn deny(name: impl Into<String>) -> Self {
		Self::with_effect(name, RuleEffect::Fixed(Effect::Deny))
	}

	/// Rule whose effect is computed by `producer` at evaluation time.
	pub fn producing(name: impl Into<String>, producer: impl EffectProducer + 'static) -> Self {
		Self::with_effect(name, RuleEffect::Producer(Arc::new(producer)))
	}

	pub fn target(mut self, target: Target) -> Self {
		self.target = target;
		self
	}

	pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
		self.condition = Some(Arc::new(condition));
		self
	}

	pub fn obligation(mut self, obligation: Obligation) -> Self {
		self.obligations.push(obligation);
		self
	}

	pub fn advice(mut self, advice: Advice) -> Self {
		self.advice.push(advice);
		self
	}
}

pub struct PolicyBuilder {
	name: String,
	target: Target,
	algorithm: CombiningAlgorithm,
	rules: Vec<RuleBuilder>,
}

impl PolicyBuilder {
	pub fn new(name: impl Into<String>, algorithm: CombiningAlgorithm) -> Self {
		Self {
			name: name.into(),
			target: Target::any(),
			algorithm,
			rules: Vec::new(),
		}
	}

	pub fn target(mut self, target: Target) -> Self {
		self.target = target;
		self
	}

	pub fn rule(mut self, rule: RuleBuilder) -> Self {
		self.rules.push(rule);
		self
	}
}

enum ChildBuilder {
	Policy(PolicyBuilder),
	PolicySet(PolicySetBuilder),
}

impl ChildBuilder {
	fn name(&self) -> &str {
		match self {
			ChildBuilder::Policy(p) => &p.name,
			ChildBuilder::PolicySet(s) => &s.name,
		}
	}

	fn kind(&self) -> NodeKind {
		match self {
			ChildBuilder::Policy(_) => NodeKind::Policy,
			ChildBuilder::PolicySet(_) => NodeKind::PolicySet,
		}
	}
}

pub struct PolicySetBuilder {
	name: String,
	target: Target,
	algorithm: CombiningAlgorithm,
	children: Vec<ChildBuilder>,
}

impl PolicySetBuilder {
	pub fn new(name: impl Into<String>, algorithm: CombiningAlgorithm) -> Self {
		Self {
			name: name.into(),
			target: Target::any(),
			algorithm,
			children: Vec::new(),
		}
	}

	pub fn target(mut self, target: Target) -> Self {
		self.target = target;
		self
	}

	pub fn policy(mut self, policy: PolicyBuilder) -> Self {
		self.children.push(ChildBuilder::Policy(policy));
		self
	}

	pub fn policy_set(mut self, policy_set: PolicySetBuilder) -> Self {
		self.children.push(ChildBuilder::PolicySet(policy_set));
		self
	}

	/// Validates and flattens this set, as the root, into a [`PolicyTree`].
	pub fn build(self) -> PolicyResult<PolicyTree> {
		check_name(NodeKind::PolicySet, &self.name, ROOT_SCOPE)?;
		let mut arena = Arena::default();
		let root = arena.policy_set(self)?;
		Ok(PolicyTree::from_parts(arena.nodes, root))
	}
}

#[derive(Default)]
struct Arena {
	nodes: Vec<Node>,
}

impl Arena {
	fn push(&mut self, node: Node) -> PolicyResult<NodeId> {
		let index = u32::try_from(self.nodes.len()).map_err(|_| PolicyError::TooManyNodes {
			max: u32::MAX as usize,
		})?;
		self.nodes.push(node);
		Ok(NodeId::new(index))
	}

	fn policy_set(&mut self, set: PolicySetBuilder) -> PolicyResult<NodeId> {
		check_not_empty(NodeKind::PolicySet, &set.name, set.algorithm, set.children.len())?;
		check_unique(
			&set.name,
			set.children.iter().map(|c| (c.kind(), c.name())),
		)?;

		let mut children = Vec::with_capacity(set.children.len());
		for child in set.children {
			let id = match child {
				ChildBuilder::Policy(policy) => self.policy(policy)?,
				ChildBuilder::PolicySet(nested) => self.policy_set(nested)?,
			};
			children.push(id);
		}

		self.push(Node::PolicySet(PolicySetNode {
			name: set.name,
			target: set.target,
			algorithm: set.algorithm,
			children,
		}))
	}

	fn policy(&mut self, policy: PolicyBuilder) -> PolicyResult<NodeId> {
		check_not_empty(NodeKind::Policy, &policy.name, policy.algorithm, policy.rules.len())?;
		check_unique(
			&policy.name,
			policy.rules.iter().map(|r| (NodeKind::Rule, r.name.as_str())),
		)?;

		let mut rules = Vec::with_capacity(policy.rules.len());
		for rule in policy.rules {
			rules.push(self.push(Node::Rule(RuleNode {
				name: rule.name,
				target: rule.target,
				condition: rule.condition,
				effect: rule.effect,
				obligations: rule.obligations,
				advice: rule.advice,
			}))?);
		}

		self.push(Node::Policy(PolicyNode {
			name: policy.name,
			target: policy.target,
			algorithm: policy.algorithm,
			rules,
		}))
	}
}

fn check_name(kind: NodeKind, name: &str, scope: &str) -> PolicyResult<()> {
	if name.trim().is_empty() {
		return Err(PolicyError::EmptyName {
			kind,
			scope: scope.to_string(),
		});
	}
	Ok(())
}

fn check_not_empty(
	kind: NodeKind,
	name: &str,
	algorithm: CombiningAlgorithm,
	children: usize,
) -> PolicyResult<()> {
	if children == 0 && !algorithm.has_default() {
		return Err(PolicyError::EmptyContainer {
			kind,
			name: name.to_string(),
			algorithm,
		});
	}
	Ok(())
}

fn check_unique<'a>(
	scope: &str,
	children: impl Iterator<Item = (NodeKind, &'a str)>,
) -> PolicyResult<()> {
	let mut seen = HashSet::new();
	for (kind, name) in children {
		check_name(kind, name, scope)?;
		if !seen.insert(name) {
			return Err(PolicyError::DuplicateName {
				kind,
				name: name.to_string(),
				scope: scope.to_string(),
			});
		}
	}
	Ok(())
}
