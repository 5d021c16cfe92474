//! # Mutation Registry
//!
//! The single source of truth for a variation: its ordered mutations plus
//! the page-wide CSS and JS.
//!
//! The mutation list is never edited in place. Every change builds a new
//! `Rc<[DeclarativeMutation]>`, so consumers can tell "the list changed" by
//! pointer identity alone.

use crate::errors::{EditorError, EditorResult};
use crate::mutations::{DeclarativeMutation, Variation};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MutationRegistry {
    mutations: Rc<[DeclarativeMutation]>,
    css: String,
    js: String,
    name: String,
    description: String,
    variation_id: String,
}

impl MutationRegistry {
    pub fn new() -> Self {
        Self {
            mutations: Rc::from(Vec::new()),
            css: String::new(),
            js: String::new(),
            name: String::new(),
            description: String::new(),
            variation_id: String::new(),
        }
    }

    pub fn from_variation(variation: Variation) -> Self {
        Self {
            mutations: Rc::from(variation.dom_mutations),
            css: variation.css,
            js: variation.js,
            name: variation.name,
            description: variation.description,
            variation_id: variation.variation_id,
        }
    }

    /// Current list. Cloning the `Rc` is cheap; the slice never changes.
    pub fn mutations(&self) -> Rc<[DeclarativeMutation]> {
        Rc::clone(&self.mutations)
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn last(&self) -> Option<&DeclarativeMutation> {
        self.mutations.last()
    }

    pub fn push(&mut self, mutation: DeclarativeMutation) {
        self.extend(vec![mutation]);
    }

    pub fn extend(&mut self, mutations: Vec<DeclarativeMutation>) {
        if mutations.is_empty() {
            return;
        }
        let mut next = self.mutations.to_vec();
        next.extend(mutations);
        self.mutations = Rc::from(next);
    }

    pub fn remove(&mut self, index: usize) -> EditorResult<DeclarativeMutation> {
        if index >= self.mutations.len() {
            return Err(EditorError::IndexOutOfRange(index));
        }
        let mut next = self.mutations.to_vec();
        let removed = next.remove(index);
        self.mutations = Rc::from(next);
        Ok(removed)
    }

    pub fn pop(&mut self) -> Option<DeclarativeMutation> {
        let last = self.mutations.last().cloned()?;
        self.mutations = Rc::from(&self.mutations[..self.mutations.len() - 1]);
        Some(last)
    }

    pub fn replace(&mut self, mutations: Vec<DeclarativeMutation>) {
        self.mutations = Rc::from(mutations);
    }

    /// Install a previously taken snapshot, keeping its identity
    pub fn restore(&mut self, snapshot: Rc<[DeclarativeMutation]>) {
        self.mutations = snapshot;
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn set_css(&mut self, css: impl Into<String>) {
        self.css = css.into();
    }

    pub fn js(&self) -> &str {
        &self.js
    }

    pub fn set_js(&mut self, js: impl Into<String>) {
        self.js = js.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn to_variation(&self) -> Variation {
        Variation {
            name: self.name.clone(),
            description: self.description.clone(),
            variation_id: self.variation_id.clone(),
            css: self.css.clone(),
            js: self.js.clone(),
            dom_mutations: self.mutations.to_vec(),
        }
    }
}

impl Default for MutationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
