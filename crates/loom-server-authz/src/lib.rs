// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization enforcement for Loom services.
//!
//! Wraps a [`loom_policy_core::PolicyDecisionPoint`] with the pieces a server
//! needs around it: a request builder, principal plumbing, ready-made
//! conditions, obligation execution, auditing and configuration.
//!
//! ```
//! use loom_policy_core::{CombiningAlgorithm, Match, PolicyBuilder, PolicyDecisionPoint,
//! 	PolicySetBuilder, RuleBuilder, Target};
//! use loom_server_authz::{conditions, AccessRequest, AuthorizationManager, Principal,
//! 	StaticPrincipal};
//!
//! let tree = PolicySetBuilder::new("root", CombiningAlgorithm::DenyUnlessPermit)
//! 	.policy(
//! 		PolicyBuilder::new("comments", CombiningAlgorithm::FirstApplicable)
//! 			.target(Target::matching(Match::resource_type("comments")))
//! 			.rule(
//! 				RuleBuilder::permit("delete-own-comment")
//! 					.target(Target::matching(Match::action("delete_comment")))
//! 					.condition(conditions::is_owner_or_admin()),
//! 			),
//! 	)
//! 	.build()
//! 	.expect("valid policy tree");
//!
//! let manager = AuthorizationManager::new(PolicyDecisionPoint::new(tree))
//! 	.with_principal_accessor(StaticPrincipal::new(Principal::new("42")));
//!
//! let request = AccessRequest::new("delete_comment")
//! 	.resource("comments", 123)
//! 	.attribute("owner_id", 42);
//! assert!(manager.authorize(&request).is_ok());
//! ```

pub mod audit;
pub mod conditions;
pub mod config;
pub mod error;
pub mod manager;
pub mod principal;
pub mod request;

pub use audit::{AuditSink, AuthzAuditEvent, AuthzEventType, MemoryAuditSink, TracingAuditSink};
pub use config::{load_config, AuthzConfig, AuthzConfigLayer};
pub use error::{AuthorizationError, ConfigError, DenialReason};
pub use manager::AuthorizationManager;
pub use principal::{Principal, PrincipalAccessor, PrincipalId, StaticPrincipal, PRINCIPAL_ENV_KEY};
pub use request::AccessRequest;
