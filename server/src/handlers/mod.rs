//! Request handlers.

mod changes;
mod documents;
mod revisions;

pub use changes::*;
pub use documents::*;
pub use revisions::*;
