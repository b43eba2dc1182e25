//! Entity definitions (database row mappings).

pub mod alert;

pub use alert::AlertEntity;
