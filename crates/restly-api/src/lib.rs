// restly-api: Async JSON REST transport used by restly entities.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{APPLICATION_JSON, Reply, RestClient, RestRequest};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};

// Re-exported so callers can build requests without depending on reqwest.
pub use reqwest::{Method, StatusCode};
