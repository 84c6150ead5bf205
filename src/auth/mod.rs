pub mod jwt;

pub use jwt::{JwtIssuer, TokenIssuer};
