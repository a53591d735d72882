pub mod buffer;

pub use buffer::{Primitive, SerializationBuffer};
