//! Process-local backends. Each instance owns its state; nothing is global.

mod comments;
mod directory;

pub use comments::MemoryCommentStore;
pub use directory::MemoryDirectory;
