//! Purpose: Define the stable public Rust API boundary for ediwire.
//! Exports: Core types and operations needed by the CLI and tests.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path to core primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

mod remote;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::x12::{
    Document, ELEMENT_SEPARATOR, SEGMENT_TERMINATOR, Segment, parse,
};
pub use remote::RemoteClient;
