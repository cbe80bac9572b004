//! JSON-Schema tree traversal
//!
//! [`walker`] rewrites schemas, [`mutator`] rewrites data documents guided by
//! a schema, and [`well_known`] names the shared primitive definitions that
//! v1 schemas reference.

pub mod mutator;
pub mod walker;
pub mod well_known;

pub use mutator::{mutate_data_node, satisfies_primitive, MigratedNode};
pub use walker::mutate_schemas;
pub use well_known::{WellKnownType, WELL_KNOWN_TYPES_PREFIX};
