pub mod client;
pub mod rate_limit;

pub use client::*;
pub use rate_limit::*;
