//! Low-level primitives for building the storage engine.

/// Positioned file I/O abstractions.
///
/// Interfaces for reading/writing record stores at fixed offsets.
pub mod io;
