//! Repository implementations for database operations.

pub mod alert;

pub use alert::AlertRepository;
