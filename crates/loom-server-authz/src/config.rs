// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enforcement configuration.
//!
//! Layers are merged in precedence order: built-in defaults, then the
//! `[authz]` table of a TOML file, then `LOOM_SERVER_AUTHZ_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;

pub const ENV_AUDIT_GRANTED: &str = "LOOM_SERVER_AUTHZ_AUDIT_GRANTED";
pub const ENV_ADVICE_ENABLED: &str = "LOOM_SERVER_AUTHZ_ADVICE_ENABLED";
pub const ENV_EXECUTE_DENY_OBLIGATIONS: &str = "LOOM_SERVER_AUTHZ_EXECUTE_DENY_OBLIGATIONS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthzConfigLayer {
	pub audit_granted: Option<bool>,
	pub advice_enabled: Option<bool>,
	pub execute_deny_obligations: Option<bool>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.audit_granted.is_some() {
			self.audit_granted = other.audit_granted;
		}
		if other.advice_enabled.is_some() {
			self.advice_enabled = other.advice_enabled;
		}
		if other.execute_deny_obligations.is_some() {
			self.execute_deny_obligations = other.execute_deny_obligations;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			audit_granted: self.audit_granted.unwrap_or(true),
			advice_enabled: self.advice_enabled.unwrap_or(true),
			execute_deny_obligations: self.execute_deny_obligations.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthzConfig {
	/// Send `AccessGranted` events to the audit sink. Denials are always sent.
	pub audit_granted: bool,
	/// Run advice attached to a decision.
	pub advice_enabled: bool,
	/// Run Deny-triggered obligations and advice when access is refused.
	pub execute_deny_obligations: bool,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		AuthzConfigLayer::default().finalize()
	}
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
	#[serde(default)]
	authz: Option<AuthzConfigLayer>,
}

/// Parses the `[authz]` table out of a TOML document. Other tables are ignored.
pub fn layer_from_toml_str(content: &str, path: &Path) -> Result<AuthzConfigLayer, ConfigError> {
	let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::TomlParse {
		path: path.to_path_buf(),
		source: e,
	})?;
	Ok(file.authz.unwrap_or_default())
}

/// Loads the `[authz]` table from `path`. A missing file is an empty layer.
pub fn layer_from_file(path: impl Into<PathBuf>) -> Result<AuthzConfigLayer, ConfigError> {
	let path = path.into();
	if !path.exists() {
		debug!(path = %path.display(), "authz config file not found, skipping");
		return Ok(AuthzConfigLayer::default());
	}

	debug!(path = %path.display(), "loading authz config file");
	let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
		path: path.clone(),
		source: e,
	})?;
	let layer = layer_from_toml_str(&content, &path)?;
	trace!(?layer, "parsed authz config layer from TOML");
	Ok(layer)
}

/// Builds a layer from `LOOM_SERVER_AUTHZ_*` variables resolved by `lookup`.
pub fn layer_from_env_vars<F>(lookup: F) -> Result<AuthzConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
	Ok(AuthzConfigLayer {
		audit_granted: parse_bool(ENV_AUDIT_GRANTED, var(ENV_AUDIT_GRANTED))?,
		advice_enabled: parse_bool(ENV_ADVICE_ENABLED, var(ENV_ADVICE_ENABLED))?,
		execute_deny_obligations: parse_bool(
			ENV_EXECUTE_DENY_OBLIGATIONS,
			var(ENV_EXECUTE_DENY_OBLIGATIONS),
		)?,
	})
}

/// [`layer_from_env_vars`] over the process environment.
pub fn layer_from_env() -> Result<AuthzConfigLayer, ConfigError> {
	debug!("loading authz environment variables");
	layer_from_env_vars(|name| std::env::var(name).ok())
}

/// Defaults, then `path` (if given), then the environment.
pub fn load_config(path: Option<&Path>) -> Result<AuthzConfig, ConfigError> {
	let mut layer = AuthzConfigLayer::default();
	if let Some(path) = path {
		layer.merge(layer_from_file(path)?);
	}
	layer.merge(layer_from_env()?);
	Ok(layer.finalize())
}

fn parse_bool(key: &str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
	let Some(value) = value else {
		return Ok(None);
	};
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(Some(true)),
		"false" | "0" | "no" | "off" => Ok(Some(false)),
		_ => Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("invalid boolean value '{value}'"),
		}),
	}
}
