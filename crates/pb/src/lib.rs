//! Wire types for the write protocol. Checked in prost output style so the
//! build does not depend on protoc; field numbers are frozen - changing one
//! is a wire format break.

pub mod model;
pub mod stream;
