pub mod client;
pub mod credentials;
pub mod generator;
pub mod http_client;
pub mod prompts;

pub use client::*;
pub use credentials::*;
pub use generator::*;
pub use prompts::*;
