//! Authoritative submission table and the store that appends to it.

/// Append path: stamping, widening, persisting, photo side-write.
pub mod store;
/// In-memory table with a growing column set and linear search.
pub mod table;
