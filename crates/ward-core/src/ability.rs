// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ability computation per resource kind.
//!
//! An [`AbilityRegistry`] maps each [`ResourceType`] to the
//! [`AbilityFactory`] that turns a resolved [`PermissionLevel`] into the set
//! of [`Action`]s a principal may perform. Factories are registered
//! explicitly at startup and looked up by key afterwards; the registry is
//! read-only once built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::types::{PermissionLevel, ResourceType};

/// Operations a principal may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Read,
	Comment,
	Edit,
	Share,
	Manage,
	Delete,
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Action::Read => write!(f, "read"),
			Action::Comment => write!(f, "comment"),
			Action::Edit => write!(f, "edit"),
			Action::Share => write!(f, "share"),
			Action::Manage => write!(f, "manage"),
			Action::Delete => write!(f, "delete"),
		}
	}
}

/// Computes the abilities a permission level grants on one resource kind.
pub trait AbilityFactory: Send + Sync {
	fn resource_type(&self) -> ResourceType;

	fn abilities(&self, permission: PermissionLevel) -> BTreeSet<Action>;
}

/// Documents support comments; everything else is cumulative by rank.
pub struct DocumentAbilities;

impl AbilityFactory for DocumentAbilities {
	fn resource_type(&self) -> ResourceType {
		ResourceType::Document
	}

	fn abilities(&self, permission: PermissionLevel) -> BTreeSet<Action> {
		cumulative(
			permission,
			&[
				(PermissionLevel::Read, Action::Read),
				(PermissionLevel::Comment, Action::Comment),
				(PermissionLevel::Edit, Action::Edit),
				(PermissionLevel::Manage, Action::Share),
				(PermissionLevel::Manage, Action::Manage),
				(PermissionLevel::Owner, Action::Delete),
			],
		)
	}
}

/// Workspaces and subspaces are containers: `comment` adds nothing over `read`.
pub struct ContainerAbilities {
	resource_type: ResourceType,
}

impl ContainerAbilities {
	pub fn workspace() -> Self {
		Self {
			resource_type: ResourceType::Workspace,
		}
	}

	pub fn subspace() -> Self {
		Self {
			resource_type: ResourceType::Subspace,
		}
	}
}

impl AbilityFactory for ContainerAbilities {
	fn resource_type(&self) -> ResourceType {
		self.resource_type
	}

	fn abilities(&self, permission: PermissionLevel) -> BTreeSet<Action> {
		cumulative(
			permission,
			&[
				(PermissionLevel::Read, Action::Read),
				(PermissionLevel::Edit, Action::Edit),
				(PermissionLevel::Manage, Action::Share),
				(PermissionLevel::Manage, Action::Manage),
				(PermissionLevel::Owner, Action::Delete),
			],
		)
	}
}

fn cumulative(
	permission: PermissionLevel,
	thresholds: &[(PermissionLevel, Action)],
) -> BTreeSet<Action> {
	thresholds
		.iter()
		.filter(|(minimum, _)| permission.includes(*minimum))
		.map(|(_, action)| *action)
		.collect()
}

#[derive(Clone, Default)]
pub struct AbilityRegistry {
	factories: HashMap<ResourceType, Arc<dyn AbilityFactory>>,
}

impl AbilityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry with the built-in factory for every resource kind.
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		let defaults: [Arc<dyn AbilityFactory>; 3] = [
			Arc::new(ContainerAbilities::workspace()),
			Arc::new(ContainerAbilities::subspace()),
			Arc::new(DocumentAbilities),
		];
		for factory in defaults {
			registry.factories.insert(factory.resource_type(), factory);
		}
		registry
	}

	pub fn register(&mut self, factory: Arc<dyn AbilityFactory>) -> Result<(), RegistryError> {
		let resource_type = factory.resource_type();
		if self.factories.contains_key(&resource_type) {
			return Err(RegistryError::Duplicate(resource_type));
		}
		self.factories.insert(resource_type, factory);
		tracing::debug!(%resource_type, "ability factory registered");
		Ok(())
	}

	pub fn factory(&self, resource_type: ResourceType) -> Option<&Arc<dyn AbilityFactory>> {
		self.factories.get(&resource_type)
	}

	pub fn abilities(
		&self,
		resource_type: ResourceType,
		permission: PermissionLevel,
	) -> Result<BTreeSet<Action>, RegistryError> {
		self.factory(resource_type)
			.map(|factory| factory.abilities(permission))
			.ok_or(RegistryError::Unregistered(resource_type))
	}

	pub fn can(
		&self,
		resource_type: ResourceType,
		permission: PermissionLevel,
		action: Action,
	) -> Result<bool, RegistryError> {
		Ok(self.abilities(resource_type, permission)?.contains(&action))
	}
}

impl fmt::Debug for AbilityRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut kinds: Vec<_> = self.factories.keys().collect();
		kinds.sort();
		f.debug_struct("AbilityRegistry")
			.field("resource_types", &kinds)
			.finish()
	}
}
