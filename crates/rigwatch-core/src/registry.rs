//! Field registry - maps telemetry fields to extractors and shared resources
//!
//! Each field declares the shared resources (named, parameterized fetches) its
//! extractor expects. Resolving a field list yields the specs plus the distinct
//! set of fetches needed, so a resource shared by many fields is fetched once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::value::Scalar;

/// Request parameters for a fetch command, ordered by name
pub type Parameters = BTreeMap<String, Scalar>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Field already registered: {0}")]
    DuplicateField(String),
    #[error("Field {field} declares resource key {key} more than once")]
    DuplicateResourceKey { field: String, key: String },
}

/// A named, parameterized prefetch result that extractors can share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResourceRef {
    /// Name the extractor looks the resource up under
    pub resource_key: String,
    /// Device command to fetch
    pub fetch_command: String,
    /// Parameters sent with the command
    #[serde(default)]
    pub parameters: Parameters,
}

impl SharedResourceRef {
    pub fn new(resource_key: impl Into<String>, fetch_command: impl Into<String>) -> Self {
        Self {
            resource_key: resource_key.into(),
            fetch_command: fetch_command.into(),
            parameters: Parameters::new(),
        }
    }

    /// Add a request parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Two refs are the same fetch when command and parameters match,
    /// whatever key the extractor uses for it
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.fetch_command == other.fetch_command && self.parameters == other.parameters
    }

    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }
}

/// Registration entry for a single telemetry field
pub struct FieldSpec<E> {
    pub name: String,
    pub extractor: E,
    pub dependencies: Vec<SharedResourceRef>,
}

impl<E> fmt::Debug for FieldSpec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Output of [`FieldRegistry::resolve`]
#[derive(Debug)]
pub struct Resolution<'a, E> {
    /// Specs for the requested fields, duplicates removed, in request order
    pub fields: Vec<&'a FieldSpec<E>>,
    /// Distinct fetches across all requested fields, in first-seen order
    pub resources: Vec<&'a SharedResourceRef>,
}

impl<E> Resolution<'_, E> {
    /// Position of the distinct fetch equivalent to `dep`
    pub fn resource_index(&self, dep: &SharedResourceRef) -> Option<usize> {
        self.resources.iter().position(|r| r.is_equivalent(dep))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Declarative table of telemetry fields for one device type
pub struct FieldRegistry<E> {
    specs: Vec<FieldSpec<E>>,
    index: HashMap<String, usize>,
}

impl<E> Default for FieldRegistry<E> {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<E> fmt::Debug for FieldRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.specs.iter()).finish()
    }
}

impl<E> FieldRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field with its extractor and declared dependencies
    pub fn register(
        &mut self,
        name: impl Into<String>,
        extractor: E,
        dependencies: Vec<SharedResourceRef>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateField(name));
        }

        let mut keys = HashSet::new();
        for dep in &dependencies {
            if !keys.insert(dep.resource_key.as_str()) {
                return Err(RegistryError::DuplicateResourceKey {
                    field: name,
                    key: dep.resource_key.clone(),
                });
            }
        }

        debug!(field = %name, deps = dependencies.len(), "Registered field");

        self.index.insert(name.clone(), self.specs.len());
        self.specs.push(FieldSpec {
            name,
            extractor,
            dependencies,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec<E>> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered field names in registration order
    pub fn field_names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve requested fields into their specs and the distinct fetches needed
    ///
    /// Duplicate names are dropped (first occurrence wins). Any name without a
    /// registered spec fails the whole resolution.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Resolution<'_, E>, RegistryError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();

        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let spec = self
                .get(name)
                .ok_or_else(|| RegistryError::UnknownField(name.to_string()))?;
            fields.push(spec);
        }

        let mut resources: Vec<&SharedResourceRef> = Vec::new();
        for spec in &fields {
            for dep in &spec.dependencies {
                if !resources.iter().any(|r| r.is_equivalent(dep)) {
                    resources.push(dep);
                }
            }
        }

        Ok(Resolution { fields, resources })
    }
}
