//! The isolation layer: shadow globals, their scope layers, and the entry
//! points that compile code against them.

pub mod config;
pub mod executor;
pub mod identifier;
pub mod imports;
pub mod io;
pub mod limits;
pub(crate) mod reflect;
pub mod shadow;
pub mod snapshot;
pub(crate) mod wrapper;
