use indexmap::IndexMap;

use crate::value::Value;

// Script calls recurse natively in the evaluator; a deeper limit overflows
// the native stack of a debug-build test thread before it is reached.
pub const MAX_CALL_DEPTH: usize = 64;

/// Reads search innermost-outward; writes always land in the innermost
/// scope.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<IndexMap<String, Value>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// The global scope at the bottom is never popped.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn visible(&self) -> IndexMap<String, Value> {
        let mut merged = IndexMap::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Every binding in every scope, shadowed or not.
    pub fn iter_values(&self) -> impl Iterator<Item = &Value> {
        self.scopes.iter().flat_map(|scope| scope.values())
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<String>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.frames.push(name.into());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}
