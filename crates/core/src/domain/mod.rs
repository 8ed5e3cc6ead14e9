pub mod comments;
pub mod identity;
pub mod votes;
