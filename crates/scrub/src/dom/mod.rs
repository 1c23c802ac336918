// ABOUTME: Document model and structural analysis for the scrub pipeline.
// ABOUTME: Arena tree, pre-order index, tree helpers, bias tables and the boilerplate scorer.

//! DOM layer.
//!
//! [`tree::Document`] owns every node; the other modules read and mutate it
//! through [`tree::NodeId`] handles.

pub mod bias;
pub mod index;
pub mod scoring;
pub mod selector;
pub mod tree;
pub mod utils;

pub use bias::ScoringWeights;
pub use index::PreorderIndex;
pub use scoring::{score_and_prune, ScoreOutcome};
pub use selector::CssSelector;
pub use tree::{Document, ElementData, NodeId, NodeKind};
