// SPDX-License-Identifier: MIT OR Apache-2.0
//! Append-only registry of [`ErrorType`]s.
//!
//! The repository is filled during startup through `&mut self` and then
//! shared behind an `Arc`; after that point it is only read, so lookups from
//! any number of threads need no synchronisation.

use crate::error_type::{ANY_IDENTIFIER, CRITICAL_IDENTIFIER, ErrorType};
use crate::identifier::ComponentIdentifier;
use std::collections::{BTreeSet, HashMap};

/// Configuration defects raised while building or querying the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The `(namespace, identifier)` pair is already registered.
    #[error("error type '{0}' is already registered")]
    Duplicate(ComponentIdentifier),

    /// No error type with that pair exists.
    #[error("could not find error type '{0}'")]
    Unknown(ComponentIdentifier),

    /// The requested parent does not belong to this repository.
    #[error("parent '{parent}' of error type '{child}' is not registered in this repository")]
    UnknownParent {
        /// Identifier being added.
        child: ComponentIdentifier,
        /// Identifier of the rejected parent.
        parent: ComponentIdentifier,
    },
}

/// Registry holding exactly one [`ErrorType`] per `(namespace, identifier)`.
///
/// `CORE:ANY` and `CORE:CRITICAL` are seeded on construction; both are roots.
#[derive(Debug, Clone)]
pub struct ErrorTypeRepository {
    types: HashMap<ComponentIdentifier, ErrorType>,
    any: ErrorType,
    critical: ErrorType,
}

impl Default for ErrorTypeRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTypeRepository {
    /// Create a repository containing only ANY and CRITICAL.
    pub fn new() -> Self {
        let any = ErrorType::new(ComponentIdentifier::core(ANY_IDENTIFIER), None);
        let critical = ErrorType::new(ComponentIdentifier::core(CRITICAL_IDENTIFIER), None);
        let mut types = HashMap::new();
        types.insert(any.component_identifier().clone(), any.clone());
        types.insert(critical.component_identifier().clone(), critical.clone());
        Self {
            types,
            any,
            critical,
        }
    }

    /// Register a new error type under `parent`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Duplicate`] when the pair already exists and
    /// [`RepositoryError::UnknownParent`] when `parent` was not created by
    /// this repository.
    pub fn add_error_type(
        &mut self,
        id: ComponentIdentifier,
        parent: &ErrorType,
    ) -> Result<ErrorType, RepositoryError> {
        if self.types.contains_key(&id) {
            return Err(RepositoryError::Duplicate(id));
        }
        let owned = self
            .types
            .get(parent.component_identifier())
            .is_some_and(|p| p.same_instance(parent));
        if !owned {
            return Err(RepositoryError::UnknownParent {
                child: id,
                parent: parent.component_identifier().clone(),
            });
        }
        let error_type = ErrorType::new(id.clone(), Some(parent.clone()));
        self.types.insert(id, error_type.clone());
        Ok(error_type)
    }

    /// Look up a registered type.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Unknown`] when nothing is registered under `id`.
    pub fn lookup_error_type(&self, id: &ComponentIdentifier) -> Result<ErrorType, RepositoryError> {
        self.get_error_type(id)
            .ok_or_else(|| RepositoryError::Unknown(id.clone()))
    }

    /// Non-failing variant of [`lookup_error_type`](Self::lookup_error_type).
    pub fn get_error_type(&self, id: &ComponentIdentifier) -> Option<ErrorType> {
        self.types.get(id).cloned()
    }

    /// Return the registered type, registering it as a child of ANY first if
    /// it is missing. Backs lazily-initialised deployments where a mapping
    /// may reference a type whose declaring component was never loaded.
    pub fn lookup_or_add(&mut self, id: &ComponentIdentifier) -> ErrorType {
        if let Some(existing) = self.types.get(id) {
            return existing.clone();
        }
        let error_type = ErrorType::new(id.clone(), Some(self.any.clone()));
        self.types.insert(id.clone(), error_type.clone());
        error_type
    }

    /// The root of every recoverable error type.
    pub fn any_error_type(&self) -> &ErrorType {
        &self.any
    }

    /// The root of the unrecoverable hierarchy, outside the ANY tree.
    pub fn critical_error_type(&self) -> &ErrorType {
        &self.critical
    }

    /// Distinct namespaces, sorted.
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.types.keys().map(ComponentIdentifier::namespace).collect()
    }

    /// Number of registered types, including the two roots.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`; the roots are present from construction.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All registered types sorted by `(namespace, identifier)`.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorType> {
        let mut all: Vec<_> = self.types.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all.into_iter().map(|(_, t)| t)
    }
}
