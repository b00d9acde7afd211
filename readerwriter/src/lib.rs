//! Minimal binary encoding toolkit: `Reader` and `Writer` interfaces
//! and the `Encodable`/`Decodable` traits built on top of them.
mod codable;
mod reader;
mod writer;

pub use codable::{Decodable, Encodable, ExactSizeEncodable};
pub use reader::{ReadError, Reader};
pub use writer::{WriteError, Writer};

#[cfg(feature = "merlin")]
mod merlin_support;
