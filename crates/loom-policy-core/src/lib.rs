// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute-based policy model and decision point for Loom.
//!
//! This crate provides:
//! - The policy administration model: [`Target`]s, [`Condition`]s, rules,
//!   policies and policy sets, assembled with [`PolicySetBuilder`]
//! - [`CombiningAlgorithm`]s shared by policies and policy sets
//! - The [`PolicyDecisionPoint`], which turns a [`Context`] into a [`Decision`]
//!
//! Enforcement (running obligations, raising errors) lives in
//! `loom-server-authz`.
//!
//! # Evaluation
//!
//! ```text
//! PolicySet ─target─▶ combine(children) ─▶ Decision
//!   ├── Policy ─target─▶ combine(rules)
//!   │     └── Rule ─target─▶ condition ─▶ effect + obligations/advice
//!   └── PolicySet (nested) ...
//! ```
//!
//! The tree is built once, validated, and is immutable afterwards; evaluation
//! allocates only the per-call [`Decision`].

pub mod attribute;
pub mod builder;
pub mod combining;
pub mod condition;
pub mod context;
pub mod effect;
pub mod error;
pub mod pdp;
pub mod target;
pub mod tree;

pub use attribute::{keys, AttributeValue, Request, RequestBuilder};
pub use builder::{PolicyBuilder, PolicySetBuilder, RuleBuilder};
pub use combining::CombiningAlgorithm;
pub use condition::{Condition, ConditionError, ConditionExt};
pub use context::{Context, Environment};
pub use effect::{handler_fn, Advice, Decision, Effect, EffectHandler, HandlerError, Obligation};
pub use error::{PolicyError, PolicyResult};
pub use pdp::PolicyDecisionPoint;
pub use target::{AllOf, AnyOf, Designator, Match, Target};
pub use tree::{producer_fn, EffectProducer, Node, NodeId, NodeKind, PolicyTree, TreeVersion};
