//! Authentication primitives: JWTs, password hashing and one-time links

pub mod jwt;
pub mod links;
pub mod password;

pub use jwt::{Claims, TokenPair, TokenService, TokenType};
pub use links::{decode_uid, encode_uid, LinkPurpose};
pub use password::{hash_password, verify_password};
