pub mod password;
pub mod token;

pub use password::{PasswordError, PasswordHasher};
pub use token::{Claims, TokenError, TokenPair, TokenPurpose, TokenRequest, TokenService};
