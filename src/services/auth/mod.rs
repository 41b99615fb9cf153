pub mod factory;
pub mod issuer;
pub mod keys;
pub mod validator;

pub use factory::build_token_services;
pub use issuer::TokenIssuer;
pub use keys::{KeyError, KeyMaterial};
pub use validator::{Claims, TokenError, TokenValidator};
