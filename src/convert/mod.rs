//! Conversion between statements and entity instances.
//!
//! - **index**: subject index over a statement snapshot
//! - **literal**: literal ↔ value coercion under strict or lenient typing
//! - **from_graph**: builds object graphs from statements
//! - **to_graph**: writes entities (and what they reach) as statements

pub mod from_graph;
pub mod index;
pub mod literal;
pub mod to_graph;

pub use from_graph::{ConversionNote, GraphReader, ObjectGraph};
pub use index::{GraphFilter, StatementIndex};
pub use literal::LiteralError;
pub use to_graph::GraphWriter;
