pub mod jwt;

pub use jwt::{TokenError, TokenVerifier};
