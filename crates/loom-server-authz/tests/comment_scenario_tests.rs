// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end enforcement of the "delete your own comment" policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loom_policy_core::{
	handler_fn, CombiningAlgorithm, Effect, HandlerError, Match, Obligation, PolicyBuilder,
	PolicyDecisionPoint, PolicySetBuilder, PolicyTree, RuleBuilder, Target,
};
use loom_server_authz::audit::AuditSink;
use loom_server_authz::conditions::is_owner_or_admin;
use loom_server_authz::{
	AccessRequest, AuthorizationManager, AuthzEventType, DenialReason, MemoryAuditSink, Principal,
	StaticPrincipal,
};
use serde_json::json;

fn comment_tree(delete: RuleBuilder) -> PolicyTree {
	PolicySetBuilder::new("root", CombiningAlgorithm::DenyUnlessPermit)
		.policy(
			PolicyBuilder::new("comments", CombiningAlgorithm::FirstApplicable)
				.target(Target::matching(Match::resource_type("comments")))
				.rule(delete),
		)
		.build()
		.expect("comment policy is valid")
}

fn delete_rule() -> RuleBuilder {
	RuleBuilder::permit("delete-own-comment")
		.target(Target::matching(Match::action("delete_comment")))
		.condition(is_owner_or_admin())
}

fn manager_for(tree: PolicyTree, principal: Principal) -> AuthorizationManager {
	AuthorizationManager::new(PolicyDecisionPoint::new(tree))
		.with_principal_accessor(StaticPrincipal::new(principal))
}

fn delete_comment_123() -> AccessRequest {
	AccessRequest::new("delete_comment")
		.resource("comments", 123)
		.attribute("owner_id", 42)
}

#[test]
fn owner_can_delete_their_comment() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("42"));
	assert!(manager.authorize(&delete_comment_123()).is_ok());
}

#[test]
fn stranger_is_refused_with_request_details() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("7"));
	let err = manager.authorize(&delete_comment_123()).unwrap_err();

	assert_eq!(err.action, "delete_comment");
	assert_eq!(err.resource_type.as_deref(), Some("comments"));
	assert_eq!(err.resource_identity, Some(json!(123)));
	assert_eq!(err.extra_parameters.get("resource-attributes"), Some(&json!({ "owner_id": 42 })));
	assert_eq!(err.reason, DenialReason::Denied);
}

#[test]
fn admin_can_delete_any_comment() {
	let manager = manager_for(
		comment_tree(delete_rule()),
		Principal::new("7").with_role("admin"),
	);
	assert!(manager.authorize(&delete_comment_123()).is_ok());
}

#[test]
fn admin_without_owner_attribute_can_delete() {
	let manager = manager_for(
		comment_tree(delete_rule()),
		Principal::new("7").with_role("admin"),
	);
	let request = AccessRequest::new("delete_comment").resource("comments", 123);
	assert!(manager.authorize(&request).is_ok());
}

#[test]
fn anonymous_caller_is_refused() {
	let manager = AuthorizationManager::new(PolicyDecisionPoint::new(comment_tree(delete_rule())))
		.with_principal_accessor(StaticPrincipal::anonymous());
	assert!(manager.authorize(&delete_comment_123()).is_err());
}

#[test]
fn other_actions_fall_through_to_deny() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("42"));
	let edit = AccessRequest::new("edit_comment")
		.resource("comments", 123)
		.attribute("owner_id", 42);
	assert_eq!(manager.authorize(&edit).unwrap_err().reason, DenialReason::Denied);
}

#[test]
fn other_resource_types_fall_through_to_deny() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("42"));
	let request = AccessRequest::new("delete_comment")
		.resource("threads", 123)
		.attribute("owner_id", 42);
	assert!(manager.authorize(&request).is_err());
}

#[test]
fn missing_owner_attribute_never_grants() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("42"));
	let request = AccessRequest::new("delete_comment").resource("comments", 123);
	let decision = manager.decide(&request);

	assert_eq!(decision.effect, Effect::Deny);
	assert!(manager.authorize(&request).is_err());
}

#[test]
fn obligation_runs_once_on_permitted_delete() {
	let notified = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&notified);
	let rule = delete_rule().obligation(Obligation::on_permit(
		"notify-moderators",
		handler_fn(move |ctx| {
			assert_eq!(ctx.request().resource_identity(), Some(&json!(123)));
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}),
	));
	let manager = manager_for(comment_tree(rule), Principal::new("42"));

	manager.authorize(&delete_comment_123()).unwrap();
	assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_obligation_blocks_the_owner() {
	let rule = delete_rule().obligation(Obligation::on_permit(
		"soft-delete",
		handler_fn(|_| Err(HandlerError::new("storage offline"))),
	));
	let manager = manager_for(comment_tree(rule), Principal::new("42"));

	let err = manager.authorize(&delete_comment_123()).unwrap_err();
	assert_eq!(
		err.reason,
		DenialReason::ObligationFailed {
			obligation: "soft-delete".into()
		}
	);
}

#[test]
fn deny_obligations_never_run_on_permit() {
	let denied = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&denied);
	let rule = delete_rule().obligation(Obligation::on_deny(
		"record-denial",
		handler_fn(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}),
	));
	let manager = manager_for(comment_tree(rule), Principal::new("42"));

	manager.authorize(&delete_comment_123()).unwrap();
	assert_eq!(denied.load(Ordering::SeqCst), 0);
}

#[test]
fn each_decision_is_audited() {
	let sink = Arc::new(MemoryAuditSink::new());
	let tree = Arc::new(comment_tree(delete_rule()));
	let owner = AuthorizationManager::new(PolicyDecisionPoint::from_shared(Arc::clone(&tree)))
		.with_principal_accessor(StaticPrincipal::new(Principal::new("42")))
		.with_audit_sink(sink.clone() as Arc<dyn AuditSink>);
	let stranger = AuthorizationManager::new(PolicyDecisionPoint::from_shared(tree))
		.with_principal_accessor(StaticPrincipal::new(Principal::new("7")))
		.with_audit_sink(sink.clone() as Arc<dyn AuditSink>);

	owner.authorize(&delete_comment_123()).unwrap();
	stranger.authorize(&delete_comment_123()).unwrap_err();

	let events = sink.events();
	assert_eq!(events.len(), 2);
	assert_eq!(events[0].event_type, AuthzEventType::AccessGranted);
	assert_eq!(events[0].principal_id.as_deref(), Some("42"));
	assert_eq!(events[1].event_type, AuthzEventType::AccessDenied);
	assert_eq!(events[1].principal_id.as_deref(), Some("7"));
	assert_eq!(events[1].resource_identity, Some(json!(123)));
}

#[test]
fn shared_manager_serves_concurrent_callers() {
	let manager = manager_for(comment_tree(delete_rule()), Principal::new("42"));
	std::thread::scope(|scope| {
		let handles: Vec<_> = (0..4)
			.map(|owner| {
				let manager = &manager;
				scope.spawn(move || {
					let request = AccessRequest::new("delete_comment")
						.resource("comments", 123)
						.attribute("owner_id", 42 + owner);
					manager.authorize(&request).is_ok()
				})
			})
			.collect();

		let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
		assert_eq!(results, vec![true, false, false, false]);
	});
}
