/*
 * transform.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tree transformation pipeline infrastructure.
 */

//! Tree transformation pipeline infrastructure.
//!
//! - [`TreeTransform`] - The trait implemented by every normalization pass
//! - [`TransformPipeline`] - Ordered collection of passes to execute
//!
//! Passes run in a flat, ordered sequence (insertion order). Each pass may
//! mutate the document tree and record diagnostics in the run context. A pass
//! must leave already-normalized input unchanged, so running a pipeline twice
//! gives the same tree as running it once.
//!
//! # Example
//!
//! ```rust
//! use standoc_core::{Result, RunContext, StandocConfig, TransformPipeline, TreeTransform};
//! use standoc_xml::Document;
//!
//! struct Renamer;
//!
//! impl TreeTransform for Renamer {
//!     fn name(&self) -> &str { "renamer" }
//!
//!     fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
//!         let root = doc.root();
//!         doc.rename(root, "standard-document");
//!         Ok(())
//!     }
//! }
//!
//! let mut pipeline = TransformPipeline::new();
//! pipeline.push(Box::new(Renamer));
//!
//! let mut doc = Document::new("doc");
//! let mut ctx = RunContext::new(StandocConfig::default());
//! pipeline.execute(&mut doc, &mut ctx).unwrap();
//! assert_eq!(doc.to_string(), "<standard-document/>");
//! ```

use standoc_xml::Document;

use crate::Result;
use crate::context::RunContext;

/// Trait for tree normalization passes.
///
/// # Thread Safety
///
/// Transforms must be `Send + Sync` so a pipeline can be shared between
/// documents normalized on different tasks.
pub trait TreeTransform: Send + Sync {
    /// Human-readable name for this transform.
    ///
    /// Used for logging and debugging.
    fn name(&self) -> &str;

    /// Apply the transformation to the tree.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions. Recoverable problems are
    /// recorded in `ctx.sink`.
    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()>;
}

/// A pipeline of tree transforms to execute in order.
pub struct TransformPipeline {
    transforms: Vec<Box<dyn TreeTransform>>,
}

impl TransformPipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Add a transform to the pipeline.
    ///
    /// Transforms run in the order they are added.
    pub fn push(&mut self, transform: Box<dyn TreeTransform>) {
        self.transforms.push(transform);
    }

    /// Add multiple transforms to the pipeline.
    pub fn extend(&mut self, transforms: impl IntoIterator<Item = Box<dyn TreeTransform>>) {
        self.transforms.extend(transforms);
    }

    /// Get the number of transforms in the pipeline.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Execute all transforms in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered. Execution stops on error.
    pub fn execute(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        for transform in &self.transforms {
            tracing::debug!(transform = transform.name(), "Running transform");
            transform.transform(doc, ctx)?;
        }

        Ok(())
    }

    /// List the names of all transforms in execution order.
    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandocConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_ctx() -> RunContext {
        RunContext::new(StandocConfig::default())
    }

    /// A transform that counts its runs and appends a marker child.
    struct CountingTransform {
        name: &'static str,
        counter: Arc<AtomicUsize>,
        my_order: usize,
        order_tracker: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl TreeTransform for CountingTransform {
        fn name(&self) -> &str {
            self.name
        }

        fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            self.order_tracker.lock().unwrap().push(self.my_order);
            let marker = doc.create_element(self.name);
            let root = doc.root();
            doc.append_child(root, marker);
            Ok(())
        }
    }

    /// A transform that fails.
    struct FailingTransform;

    impl TreeTransform for FailingTransform {
        fn name(&self) -> &str {
            "failing"
        }

        fn transform(&self, _doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
            Err(crate::error::StandocError::other(
                "Transform failed intentionally",
            ))
        }
    }

    fn counting(
        name: &'static str,
        my_order: usize,
        counter: &Arc<AtomicUsize>,
        order: &Arc<std::sync::Mutex<Vec<usize>>>,
    ) -> Box<dyn TreeTransform> {
        Box::new(CountingTransform {
            name,
            counter: counter.clone(),
            my_order,
            order_tracker: order.clone(),
        })
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = TransformPipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.len(), 0);
    }

    #[test]
    fn test_push_and_extend() {
        let mut pipeline = TransformPipeline::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        pipeline.push(counting("first", 1, &counter, &order));
        pipeline.extend([
            counting("second", 2, &counter, &order),
            counting("third", 3, &counter, &order),
        ]);

        assert_eq!(pipeline.len(), 3);
        assert!(!pipeline.is_empty());
    }

    #[test]
    fn test_insertion_order() {
        let mut pipeline = TransformPipeline::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        pipeline.push(counting("first", 1, &counter, &order));
        pipeline.push(counting("second", 2, &counter, &order));
        pipeline.push(counting("third", 3, &counter, &order));

        let mut doc = Document::new("doc");
        let mut ctx = make_ctx();
        pipeline.execute(&mut doc, &mut ctx).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(doc.to_string(), "<doc><first/><second/><third/></doc>");
    }

    #[test]
    fn test_error_stops_execution() {
        let mut pipeline = TransformPipeline::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        pipeline.push(counting("before-fail", 1, &counter, &order));
        pipeline.push(Box::new(FailingTransform));
        pipeline.push(counting("after-fail", 3, &counter, &order));

        let mut doc = Document::new("doc");
        let mut ctx = make_ctx();
        let result = pipeline.execute(&mut doc, &mut ctx);

        assert!(result.is_err());
        // Only the first transform should have run
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_transform_names() {
        let mut pipeline = TransformPipeline::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        pipeline.push(counting("alpha", 1, &counter, &order));
        pipeline.push(counting("beta", 2, &counter, &order));

        assert_eq!(pipeline.transform_names(), vec!["alpha", "beta"]);
    }
}
