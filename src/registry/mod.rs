//! Definition registry.
//!
//! Maps canonical keys to parsed definitions. The registry is populated once
//! during a load phase, then sealed and only read. Lookups are lock-free so
//! concurrent validation runs can share a single registry behind an `Arc`.

pub mod source;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use papaya::HashMap as PapayaMap;

use crate::error::RegistryError;
use crate::types::{CodeSystem, Definition, ValueSet};

pub use source::{JsonSchemaSource, SchemaSource};

#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: PapayaMap<String, Arc<Definition>>,
    sealed: AtomicBool,
}

/// Counts by definition kind, reported after loading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub structure_definitions: usize,
    pub value_sets: usize,
    pub code_systems: usize,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sealed registry from already parsed definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = Definition>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        registry.seal();
        Ok(registry)
    }

    /// Runs the load phase against a schema source and seals the registry.
    pub async fn from_source(source: &dyn SchemaSource) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.load_from(source).await?;
        registry.seal();
        Ok(registry)
    }

    /// Registers every definition a source yields. Does not seal.
    pub async fn load_from(
        &self,
        source: &dyn SchemaSource,
    ) -> Result<RegistryStats, RegistryError> {
        let definitions = source.load().await?;
        for definition in definitions {
            self.register(definition)?;
        }

        let stats = self.stats();
        tracing::info!(
            "Loaded {} definitions ({} StructureDefinitions, {} ValueSets, {} CodeSystems)",
            self.len(),
            stats.structure_definitions,
            stats.value_sets,
            stats.code_systems
        );
        Ok(stats)
    }

    /// Stores a definition under its canonical key, replacing any previous one.
    pub fn register(&self, definition: impl Into<Definition>) -> Result<(), RegistryError> {
        let definition = definition.into();
        let key = definition.canonical_key().to_string();

        if self.is_sealed() {
            return Err(RegistryError::Sealed { key });
        }
        if key.is_empty() {
            return Err(RegistryError::load(format!(
                "{} without a canonical key",
                definition.resource_type()
            )));
        }

        let definitions = self.definitions.pin();
        if definitions.insert(key.clone(), Arc::new(definition)).is_some() {
            tracing::debug!("Replaced existing definition: {}", key);
        }
        Ok(())
    }

    /// Ends the load phase. Further `register` calls fail.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<Definition>, RegistryError> {
        self.definitions
            .pin()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.definitions.pin().contains_key(key)
    }

    /// Resolves a key that must name a StructureDefinition.
    pub fn structure_definition(&self, key: &str) -> Option<Arc<Definition>> {
        self.resolve(key)
            .ok()
            .filter(|d| d.as_structure_definition().is_some())
    }

    pub fn value_set(&self, url: &str) -> Option<ValueSet> {
        match self.resolve(url).ok()?.as_ref() {
            Definition::ValueSet(vs) => Some(vs.clone()),
            _ => None,
        }
    }

    pub fn code_system(&self, url: &str) -> Option<CodeSystem> {
        match self.resolve(url).ok()?.as_ref() {
            Definition::CodeSystem(cs) => Some(cs.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.definitions.pin().keys().cloned().collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for definition in self.definitions.pin().values() {
            match definition.as_ref() {
                Definition::StructureDefinition(_) => stats.structure_definitions += 1,
                Definition::ValueSet(_) => stats.value_sets += 1,
                Definition::CodeSystem(_) => stats.code_systems += 1,
            }
        }
        stats
    }
}
