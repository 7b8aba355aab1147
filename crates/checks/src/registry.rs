//! Format checker registry.

use crate::authority::Authorities;
use crate::checker::CheckerKind;
use crate::error::{CheckError, Result};
use crate::gene::GeneSymbolChecker;
use crate::guide::GuideSequenceChecker;
use crate::matrix::NumericMatrixChecker;
use crate::variant::VariantChecker;
use datagate_cache::LookupCache;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of format checkers, looked up by the names listed in a
/// format's configuration.
#[derive(Debug, Clone)]
pub struct CheckerRegistry {
    checkers: HashMap<String, CheckerKind>,
}

impl CheckerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Registry holding the built-in format checkers.
    pub fn builtin(cache: Arc<dyn LookupCache>, authorities: Authorities) -> Self {
        let mut registry = Self::new();
        for checker in [
            CheckerKind::blocking(GuideSequenceChecker),
            CheckerKind::blocking(VariantChecker),
            CheckerKind::blocking(NumericMatrixChecker),
            CheckerKind::asynchronous(GeneSymbolChecker::new(cache, authorities)),
        ] {
            registry.checkers.insert(checker.name().to_string(), checker);
        }
        registry
    }

    /// Register a checker under its own name.
    pub fn register(&mut self, checker: CheckerKind) -> Result<()> {
        let name = checker.name().to_string();
        if self.checkers.contains_key(&name) {
            return Err(CheckError::Duplicate(name));
        }
        self.checkers.insert(name, checker);
        Ok(())
    }

    /// Register a checker, replacing any existing one with the same name.
    pub fn replace(&mut self, checker: CheckerKind) -> Option<CheckerKind> {
        self.checkers.insert(checker.name().to_string(), checker)
    }

    /// Unregister a checker.
    pub fn unregister(&mut self, name: &str) -> Option<CheckerKind> {
        self.checkers.remove(name)
    }

    /// Get a checker by name.
    pub fn get(&self, name: &str) -> Option<&CheckerKind> {
        self.checkers.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checkers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered checkers.
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
