pub mod client;
pub mod debug;

pub use client::{Credential, HttpClient, HttpResponseData};
pub use debug::HttpDebugConfig;
