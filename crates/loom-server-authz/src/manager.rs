// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy Enforcement Point.
//!
//! [`AuthorizationManager`] turns an [`AccessRequest`] into a [`Context`], asks
//! the decision point, runs the resulting obligations and advice, audits the
//! outcome and either returns `Ok(())` or an [`AuthorizationError`].

use std::fmt;
use std::sync::Arc;

use loom_policy_core::{Context, Decision, Effect, Environment, PolicyDecisionPoint};
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditSink, AuthzAuditEvent, AuthzEventType, TracingAuditSink};
use crate::config::AuthzConfig;
use crate::error::{AuthorizationError, DenialReason};
use crate::principal::{
	current_principal, PrincipalAccessor, SharedPrincipalAccessor, PRINCIPAL_ENV_KEY,
};
use crate::request::AccessRequest;

#[derive(Clone)]
pub struct AuthorizationManager {
	pdp: PolicyDecisionPoint,
	environment: Environment,
	config: AuthzConfig,
	audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for AuthorizationManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthorizationManager")
			.field("pdp", &self.pdp)
			.field("environment", &self.environment)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl AuthorizationManager {
	/// Creates a manager with default config that audits through tracing.
	pub fn new(pdp: PolicyDecisionPoint) -> Self {
		Self {
			pdp,
			environment: Environment::new(),
			config: AuthzConfig::default(),
			audit: Arc::new(TracingAuditSink),
		}
	}

	pub fn with_config(mut self, config: AuthzConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
		self.audit = sink;
		self
	}

	/// Publishes `accessor` to conditions under [`PRINCIPAL_ENV_KEY`].
	pub fn with_principal_accessor(mut self, accessor: impl PrincipalAccessor + 'static) -> Self {
		let shared: SharedPrincipalAccessor = Arc::new(accessor);
		self.environment.insert(PRINCIPAL_ENV_KEY, shared);
		self
	}

	/// Adds host entries visible to every evaluation. Later entries win.
	pub fn with_environment(mut self, environment: &Environment) -> Self {
		self.environment.extend(environment);
		self
	}

	pub fn pdp(&self) -> &PolicyDecisionPoint {
		&self.pdp
	}

	pub fn config(&self) -> &AuthzConfig {
		&self.config
	}

	/// Builds the evaluation context for `request`. `overrides` shadow the
	/// manager's own environment for this call only.
	pub fn context_for(&self, request: &AccessRequest, overrides: &Environment) -> Context {
		let mut environment = self.environment.clone();
		environment.extend(overrides);
		Context::new(request.to_request(), environment)
	}

	/// Returns the raw decision without running obligations or auditing.
	pub fn decide(&self, request: &AccessRequest) -> Decision {
		let ctx = self.context_for(request, &Environment::new());
		self.pdp.evaluate(&ctx)
	}

	/// Succeeds only when the decision is Permit and every Permit obligation
	/// ran successfully.
	pub fn authorize(&self, request: &AccessRequest) -> Result<(), AuthorizationError> {
		self.authorize_with(request, &Environment::new())
	}

	/// [`authorize`](Self::authorize) with per-call environment entries, for
	/// example a principal accessor bound to the current HTTP request.
	#[instrument(
		level = "debug",
		skip(self, request, overrides),
		fields(
			action = %request.action(),
			resource_type = request.get_resource_type().unwrap_or_default(),
		)
	)]
	pub fn authorize_with(
		&self,
		request: &AccessRequest,
		overrides: &Environment,
	) -> Result<(), AuthorizationError> {
		let ctx = self.context_for(request, overrides);
		let decision = self.pdp.evaluate(&ctx);
		debug!(effect = %decision.effect, "decision returned");

		let outcome = match decision.effect {
			Effect::Permit => self.fulfill_permit(&decision, &ctx),
			Effect::Deny => {
				if self.config.execute_deny_obligations {
					self.run_deny_actions(&decision, &ctx);
				}
				Err(DenialReason::Denied)
			}
			Effect::NotApplicable => Err(DenialReason::NotApplicable),
			Effect::Indeterminate => Err(DenialReason::Indeterminate),
		};

		self.audit(request, &ctx, decision.effect, outcome.as_ref().err());

		outcome.map_err(|reason| {
			info!(reason = %reason, "access denied");
			AuthorizationError {
				action: request.action().to_string(),
				resource_type: request.get_resource_type().map(str::to_string),
				resource_identity: request.get_resource_identity().cloned(),
				extra_parameters: request.extra_parameters(),
				reason,
			}
		})
	}

	fn fulfill_permit(&self, decision: &Decision, ctx: &Context) -> Result<(), DenialReason> {
		for obligation in decision.obligations.iter().filter(|o| o.fulfill_on() == Effect::Permit) {
			if let Err(e) = obligation.execute(ctx) {
				warn!(
					obligation = obligation.id(),
					error = %e,
					"obligation failed, refusing access"
				);
				return Err(DenialReason::ObligationFailed {
					obligation: obligation.id().to_string(),
				});
			}
		}

		if self.config.advice_enabled {
			for advice in decision.advice.iter().filter(|a| a.fulfill_on() == Effect::Permit) {
				if let Err(e) = advice.execute(ctx) {
					warn!(advice = advice.id(), error = %e, "advice failed");
				}
			}
		}
		Ok(())
	}

	/// Deny-side actions never change the outcome, so failures are only logged.
	fn run_deny_actions(&self, decision: &Decision, ctx: &Context) {
		for obligation in decision.obligations.iter().filter(|o| o.fulfill_on() == Effect::Deny) {
			if let Err(e) = obligation.execute(ctx) {
				warn!(obligation = obligation.id(), error = %e, "deny obligation failed");
			}
		}
		if self.config.advice_enabled {
			for advice in decision.advice.iter().filter(|a| a.fulfill_on() == Effect::Deny) {
				if let Err(e) = advice.execute(ctx) {
					warn!(advice = advice.id(), error = %e, "advice failed");
				}
			}
		}
	}

	fn audit(
		&self,
		request: &AccessRequest,
		ctx: &Context,
		effect: Effect,
		denial: Option<&DenialReason>,
	) {
		let event_type = match denial {
			None if !self.config.audit_granted => return,
			None => AuthzEventType::AccessGranted,
			Some(_) => AuthzEventType::AccessDenied,
		};

		let mut builder = AuthzAuditEvent::builder(event_type, request.action())
			.resource(
				request.get_resource_type().map(str::to_string),
				request.get_resource_identity().cloned(),
			)
			.effect(effect)
			.tree_version(self.pdp.version());
		if let Some(reason) = denial {
			builder = builder.reason(reason.clone());
		}
		if let Ok(Some(principal)) = current_principal(ctx) {
			builder = builder.principal(principal.id.to_string());
		}
		self.audit.record(&builder.build());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audit::MemoryAuditSink;
	use crate::principal::{Principal, StaticPrincipal};
	use loom_policy_core::condition::from_fn;
	use loom_policy_core::tree::producer_fn;
	use loom_policy_core::CombiningAlgorithm::*;
	use loom_policy_core::{
		handler_fn, Advice, ConditionError, HandlerError, Match, Obligation, PolicyBuilder,
		PolicySetBuilder, RuleBuilder, Target,
	};
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	fn counter() -> Arc<AtomicUsize> {
		Arc::new(AtomicUsize::new(0))
	}

	fn counting(counter: &Arc<AtomicUsize>) -> impl loom_policy_core::EffectHandler {
		let counter = Arc::clone(counter);
		handler_fn(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		})
	}

	fn manager(
		rule: RuleBuilder,
		algorithm: loom_policy_core::CombiningAlgorithm,
	) -> (AuthorizationManager, Arc<MemoryAuditSink>) {
		let tree = PolicySetBuilder::new("root", algorithm)
			.policy(PolicyBuilder::new("docs", FirstApplicable).rule(rule))
			.build()
			.unwrap();
		let sink = Arc::new(MemoryAuditSink::new());
		let manager = AuthorizationManager::new(PolicyDecisionPoint::new(tree))
			.with_audit_sink(sink.clone() as Arc<dyn AuditSink>);
		(manager, sink)
	}

	fn read_doc() -> AccessRequest {
		AccessRequest::new("read").resource("docs", "d-1")
	}

	mod outcomes {
		use super::*;

		#[test]
		fn permit_succeeds() {
			let (manager, _) = manager(RuleBuilder::permit("allow"), DenyUnlessPermit);
			assert_eq!(manager.authorize(&read_doc()), Ok(()));
		}

		#[test]
		fn deny_fails_with_request_details() {
			let (manager, _) = manager(RuleBuilder::deny("block"), FirstApplicable);
			let request = read_doc().extra("tenant", "acme");
			let err = manager.authorize(&request).unwrap_err();

			assert_eq!(err.action, "read");
			assert_eq!(err.resource_type.as_deref(), Some("docs"));
			assert_eq!(err.resource_identity, Some(json!("d-1")));
			assert_eq!(err.extra_parameters.get("tenant"), Some(&json!("acme")));
			assert_eq!(err.reason, DenialReason::Denied);
		}

		#[test]
		fn not_applicable_fails() {
			let rule =
				RuleBuilder::permit("writes").target(Target::matching(Match::action("write")));
			let (manager, _) = manager(rule, FirstApplicable);
			let err = manager.authorize(&read_doc()).unwrap_err();
			assert_eq!(err.reason, DenialReason::NotApplicable);
		}

		#[test]
		fn indeterminate_fails_closed() {
			let rule = RuleBuilder::permit("broken")
				.condition(from_fn(|_| Err(ConditionError::new("backend unavailable"))));
			let (manager, _) = manager(rule, FirstApplicable);
			let err = manager.authorize(&read_doc()).unwrap_err();

			assert_eq!(err.reason, DenialReason::Indeterminate);
			assert!(!err.to_string().contains("backend unavailable"));
		}

		#[test]
		fn producer_effects_are_enforced() {
			let rule = RuleBuilder::producing(
				"by-tenant",
				producer_fn(|ctx| {
					Ok(match ctx.request().get("tenant") {
						Some(t) if t == "acme" => Effect::Permit,
						_ => Effect::Deny,
					})
				}),
			);
			let (manager, _) = manager(rule, FirstApplicable);
			assert!(manager.authorize(&read_doc().extra("tenant", "acme")).is_ok());
			assert!(manager.authorize(&read_doc().extra("tenant", "other")).is_err());
		}

		#[test]
		fn decide_does_not_run_obligations_or_audit() {
			let ran = counter();
			let rule = RuleBuilder::permit("allow")
				.obligation(Obligation::on_permit("count", counting(&ran)));
			let (manager, sink) = manager(rule, FirstApplicable);

			let decision = manager.decide(&read_doc());
			assert_eq!(decision.effect, Effect::Permit);
			assert_eq!(decision.obligations.len(), 1);
			assert_eq!(ran.load(Ordering::SeqCst), 0);
			assert!(sink.is_empty());
		}
	}

	mod obligations {
		use super::*;

		#[test]
		fn run_in_declared_order() {
			let log = Arc::new(Mutex::new(Vec::new()));
			let push = |id: &'static str| {
				let log = Arc::clone(&log);
				handler_fn(move |_| {
					log.lock().unwrap().push(id);
					Ok(())
				})
			};
			let rule = RuleBuilder::permit("allow")
				.obligation(Obligation::on_permit("first", push("first")))
				.obligation(Obligation::on_permit("second", push("second")))
				.advice(Advice::on_permit("third", push("third")));
			let (manager, _) = manager(rule, FirstApplicable);

			manager.authorize(&read_doc()).unwrap();
			assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
		}

		#[test]
		fn failure_converts_permit_to_error() {
			let after = counter();
			let rule = RuleBuilder::permit("allow")
				.obligation(Obligation::on_permit(
					"notify",
					handler_fn(|_| Err(HandlerError::new("smtp down"))),
				))
				.obligation(Obligation::on_permit("after", counting(&after)))
				.advice(Advice::on_permit("advice", counting(&after)));
			let (manager, sink) = manager(rule, FirstApplicable);

			let err = manager.authorize(&read_doc()).unwrap_err();
			assert_eq!(
				err.reason,
				DenialReason::ObligationFailed {
					obligation: "notify".into()
				}
			);
			assert_eq!(after.load(Ordering::SeqCst), 0);

			let events = sink.events();
			assert_eq!(events.len(), 1);
			assert_eq!(events[0].event_type, AuthzEventType::AccessDenied);
			assert_eq!(events[0].effect, Effect::Permit);
		}

		#[test]
		fn advice_failure_is_not_fatal() {
			let later = counter();
			let rule = RuleBuilder::permit("allow")
				.advice(Advice::on_permit("flaky", handler_fn(|_| Err(HandlerError::new("nope")))))
				.advice(Advice::on_permit("later", counting(&later)));
			let (manager, _) = manager(rule, FirstApplicable);

			assert!(manager.authorize(&read_doc()).is_ok());
			assert_eq!(later.load(Ordering::SeqCst), 1);
		}

		#[test]
		fn advice_can_be_disabled() {
			let ran = counter();
			let rule =
				RuleBuilder::permit("allow").advice(Advice::on_permit("hint", counting(&ran)));
			let (manager, _) = manager(rule, FirstApplicable);
			let manager = manager.with_config(AuthzConfig {
				advice_enabled: false,
				..AuthzConfig::default()
			});

			assert!(manager.authorize(&read_doc()).is_ok());
			assert_eq!(ran.load(Ordering::SeqCst), 0);
		}

		#[test]
		fn deny_obligations_run_on_deny_only() {
			let ran = counter();
			let permit_ran = counter();
			let rule = RuleBuilder::deny("block")
				.obligation(Obligation::on_deny("log-denial", counting(&ran)))
				.obligation(Obligation::on_permit("never", counting(&permit_ran)))
				.advice(Advice::on_deny("hint", counting(&ran)));
			let (manager, _) = manager(rule, FirstApplicable);

			assert!(manager.authorize(&read_doc()).is_err());
			assert_eq!(ran.load(Ordering::SeqCst), 2);
			assert_eq!(permit_ran.load(Ordering::SeqCst), 0);
		}

		#[test]
		fn failing_deny_obligation_keeps_denied_reason() {
			let rule = RuleBuilder::deny("block").obligation(Obligation::on_deny(
				"log-denial",
				handler_fn(|_| Err(HandlerError::new("disk full"))),
			));
			let (manager, _) = manager(rule, FirstApplicable);
			assert_eq!(manager.authorize(&read_doc()).unwrap_err().reason, DenialReason::Denied);
		}

		#[test]
		fn deny_obligations_can_be_disabled() {
			let ran = counter();
			let rule = RuleBuilder::deny("block")
				.obligation(Obligation::on_deny("log-denial", counting(&ran)));
			let (manager, _) = manager(rule, FirstApplicable);
			let manager = manager.with_config(AuthzConfig {
				execute_deny_obligations: false,
				..AuthzConfig::default()
			});

			assert!(manager.authorize(&read_doc()).is_err());
			assert_eq!(ran.load(Ordering::SeqCst), 0);
		}
	}

	mod environment {
		use super::*;
		use crate::conditions::IsAuthenticated;

		#[test]
		fn principal_accessor_reaches_conditions() {
			let (manager, _) = manager(
				RuleBuilder::permit("signed-in").condition(IsAuthenticated),
				FirstApplicable,
			);
			let signed_in = manager
				.clone()
				.with_principal_accessor(StaticPrincipal::new(Principal::new("u-1")));
			let anonymous = manager.with_principal_accessor(StaticPrincipal::anonymous());

			assert!(signed_in.authorize(&read_doc()).is_ok());
			assert_eq!(
				anonymous.authorize(&read_doc()).unwrap_err().reason,
				DenialReason::NotApplicable
			);
		}

		#[test]
		fn missing_accessor_is_indeterminate() {
			let (manager, _) = manager(
				RuleBuilder::permit("signed-in").condition(IsAuthenticated),
				FirstApplicable,
			);
			assert_eq!(
				manager.authorize(&read_doc()).unwrap_err().reason,
				DenialReason::Indeterminate
			);
		}

		#[test]
		fn per_call_overrides_win() {
			let (manager, _) = manager(
				RuleBuilder::permit("signed-in").condition(IsAuthenticated),
				FirstApplicable,
			);
			let manager = manager.with_principal_accessor(StaticPrincipal::anonymous());

			let accessor: SharedPrincipalAccessor =
				Arc::new(StaticPrincipal::new(Principal::new("u-2")));
			let overrides = Environment::new().with(PRINCIPAL_ENV_KEY, accessor);
			assert!(manager.authorize_with(&read_doc(), &overrides).is_ok());
			assert!(manager.authorize(&read_doc()).is_err());
		}

		#[test]
		fn host_entries_are_visible() {
			let rule = RuleBuilder::permit("feature-flag").condition(from_fn(|ctx| {
				Ok(ctx.environment().get::<bool>("beta").copied().unwrap_or(false))
			}));
			let (manager, _) = manager(rule, FirstApplicable);
			let manager = manager.with_environment(&Environment::new().with("beta", true));
			assert!(manager.authorize(&read_doc()).is_ok());
		}
	}

	mod auditing {
		use super::*;

		#[test]
		fn records_granted_and_denied() {
			let rule = RuleBuilder::permit("reads").target(Target::matching(Match::action("read")));
			let (manager, sink) = manager(rule, DenyUnlessPermit);
			let manager =
				manager.with_principal_accessor(StaticPrincipal::new(Principal::new("u-9")));

			manager.authorize(&read_doc()).unwrap();
			manager.authorize(&AccessRequest::new("write").resource("docs", "d-1")).unwrap_err();

			let events = sink.events();
			assert_eq!(events.len(), 2);
			assert_eq!(events[0].event_type, AuthzEventType::AccessGranted);
			assert_eq!(events[0].principal_id.as_deref(), Some("u-9"));
			assert_eq!(events[0].tree_version, manager.pdp().version().get());
			assert_eq!(events[1].event_type, AuthzEventType::AccessDenied);
			assert_eq!(events[1].action, "write");
			assert_eq!(events[1].reason, Some(DenialReason::Denied));
		}

		#[test]
		fn granted_events_can_be_suppressed() {
			let (manager, sink) = manager(RuleBuilder::permit("allow"), FirstApplicable);
			let manager = manager.with_config(AuthzConfig {
				audit_granted: false,
				..AuthzConfig::default()
			});

			manager.authorize(&read_doc()).unwrap();
			assert!(sink.is_empty());
		}

		#[test]
		fn denials_are_always_recorded() {
			let (manager, sink) = manager(RuleBuilder::deny("block"), FirstApplicable);
			let manager = manager.with_config(AuthzConfig {
				audit_granted: false,
				..AuthzConfig::default()
			});

			manager.authorize(&read_doc()).unwrap_err();
			assert_eq!(sink.len(), 1);
		}
	}

	#[test]
	fn manager_is_send_and_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<AuthorizationManager>();
	}
}
