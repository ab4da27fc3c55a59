// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::path::PathBuf;

use loom_policy_core::AttributeValue;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use thiserror::Error;

/// Why an enforced request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
	/// A policy explicitly denied the request.
	Denied,
	/// No policy applied and the root had no default.
	NotApplicable,
	/// Evaluation failed. The cause is kept for logs, never shown to callers.
	Indeterminate,
	/// The decision was Permit but a mandatory obligation failed.
	ObligationFailed { obligation: String },
}

impl fmt::Display for DenialReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenialReason::Denied => write!(f, "denied"),
			DenialReason::NotApplicable => write!(f, "not_applicable"),
			DenialReason::Indeterminate => write!(f, "indeterminate"),
			DenialReason::ObligationFailed { obligation } => {
				write!(f, "obligation_failed({obligation})")
			}
		}
	}
}

/// Caller-facing refusal raised by
/// [`AuthorizationManager::authorize`](crate::AuthorizationManager::authorize).
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("not authorized to {action} {}", describe_resource(.resource_type, .resource_identity))]
pub struct AuthorizationError {
	pub action: String,
	pub resource_type: Option<String>,
	pub resource_identity: Option<AttributeValue>,
	pub extra_parameters: Map<String, AttributeValue>,
	pub reason: DenialReason,
}

fn describe_resource(resource_type: &Option<String>, identity: &Option<AttributeValue>) -> String {
	let kind = resource_type.as_deref().unwrap_or("resource");
	match identity {
		Some(AttributeValue::String(id)) => format!("{kind} '{id}'"),
		Some(id) => format!("{kind} {id}"),
		None => kind.to_string(),
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}
