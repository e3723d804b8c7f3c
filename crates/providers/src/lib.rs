pub mod credential;
pub mod http;
pub mod rrf;
pub mod stub;
pub mod traits;
pub mod usage;

pub use credential::{resolve_api_key, ProviderAuthConfig};
pub use http::HttpOracle;
pub use traits::{LlmOracle, Retriever, RetrievedDoc, ScoredDoc, StructuredRequest, StructuredResult};
pub use usage::extract_usage;
