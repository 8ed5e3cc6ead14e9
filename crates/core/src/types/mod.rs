pub mod content;
pub mod ids;
pub mod page;

pub use content::{CommentContent, MAX_CONTENT_CHARS};
pub use ids::{CommentId, SolutionId, UserId};
pub use page::{PageRequest, Pagination};
