//! Dependency Resolution
//!
//! Computes a load order for the required dependencies of a module: every
//! dependency appears before the modules that need it, and the module
//! itself comes last.
//!
//! # Cycles
//!
//! `resolve` walks depth-first with a visited set keyed by name, so a cycle
//! simply stops the descent and the names involved each appear once.
//! `resolve_strict` runs the same walk but reports the first cycle it finds
//! as [`ModuleError::DependencyCycle`].
//!
//! Names that `lookup` cannot produce are left out of the order; use
//! `missing` or `check_conflicts` to detect them.

use std::collections::HashSet;
use std::sync::Arc;

use super::descriptor::ModuleDescriptor;
use super::error::ModuleError;

/// Stateless dependency-graph walker.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Post-order closure of `module`'s required dependencies, root last.
    pub fn resolve<F>(&self, module: &ModuleDescriptor, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        visited.insert(module.name.clone());
        self.visit(module, &lookup, &mut visited, &mut order);
        order.push(module.name.clone());
        order
    }

    fn visit<F>(
        &self,
        module: &ModuleDescriptor,
        lookup: &F,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        for dep in module.required_dependencies() {
            if !visited.insert(dep.name.clone()) {
                continue;
            }
            if let Some(child) = lookup(&dep.name) {
                self.visit(&child, lookup, visited, order);
                order.push(dep.name.clone());
            }
        }
    }

    /// Like `resolve`, but a cycle among required dependencies is an error.
    pub fn resolve_strict<F>(&self, module: &ModuleDescriptor, lookup: F) -> Result<Vec<String>, ModuleError>
    where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        let mut done = HashSet::new();
        let mut stack = vec![module.name.clone()];
        let mut order = Vec::new();
        self.visit_strict(module, &lookup, &mut stack, &mut done, &mut order)?;
        order.push(module.name.clone());
        Ok(order)
    }

    fn visit_strict<F>(
        &self,
        module: &ModuleDescriptor,
        lookup: &F,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), ModuleError>
    where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        for dep in module.required_dependencies() {
            if let Some(pos) = stack.iter().position(|n| n == &dep.name) {
                let mut chain = stack[pos..].to_vec();
                chain.push(dep.name.clone());
                return Err(ModuleError::DependencyCycle(chain));
            }
            if done.contains(&dep.name) {
                continue;
            }
            let Some(child) = lookup(&dep.name) else {
                continue;
            };
            stack.push(dep.name.clone());
            self.visit_strict(&child, lookup, stack, done, order)?;
            stack.pop();
            done.insert(dep.name.clone());
            order.push(dep.name.clone());
        }
        Ok(())
    }

    /// Required dependencies of `module` (direct only) that `lookup` cannot find.
    pub fn missing<F>(&self, module: &ModuleDescriptor, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        module
            .required_dependencies()
            .filter(|d| lookup(&d.name).is_none())
            .map(|d| d.name.clone())
            .collect()
    }

    /// True when a required dependency cannot be resolved.
    /// Optional dependencies never count.
    pub fn check_conflicts<F>(&self, module: &ModuleDescriptor, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<Arc<ModuleDescriptor>>,
    {
        !self.missing(module, lookup).is_empty()
    }
}
