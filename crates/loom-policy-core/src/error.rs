// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::combining::CombiningAlgorithm;
use crate::tree::NodeKind;

/// Policy construction errors. These abort startup; they are never deferred to
/// request time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
	#[error("{kind} name must not be empty (inside '{scope}')")]
	EmptyName { kind: NodeKind, scope: String },

	#[error("duplicate {kind} name '{name}' in '{scope}'")]
	DuplicateName {
		kind: NodeKind,
		name: String,
		scope: String,
	},

	#[error("{kind} '{name}' has no children and {algorithm} has no default outcome")]
	EmptyContainer {
		kind: NodeKind,
		name: String,
		algorithm: CombiningAlgorithm,
	},

	#[error("policy tree exceeds {max} nodes")]
	TooManyNodes { max: usize },
}

pub type PolicyResult<T> = Result<T, PolicyError>;
