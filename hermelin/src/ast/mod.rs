//! Abstract Syntax Tree definitions

mod node;
mod optimize;
mod span;

pub use node::*;
pub use optimize::optimize;
pub use span::*;
