mod membership_authorizer;
pub use membership_authorizer::*;
