//! Core value types: keys, statements, property values and vocabulary.

pub mod key;
pub mod prefix;
pub mod statement;
pub mod value;
pub mod vocab;

pub use key::RdfKey;
pub use prefix::PrefixMapping;
pub use statement::{Literal, Node, Statement};
pub use value::{EntityRef, Value};
