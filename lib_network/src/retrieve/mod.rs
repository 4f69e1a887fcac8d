//! # Retrieve
//!
//! Everything between a configured host and a decoded response:
//!
//! - [`endpoint`]: URL composition from `CustomHost` settings.
//! - [`transport`]: the `NetworkService` / `ByteFetcher` seams.
//! - [`ky_http`]: the live `reqwest` client with certificate pinning.
//! - [`trust`]: the pinning server-certificate verifier.
//! - [`mock`]: fixture-backed and always-failing transports.
//! - [`apicall`]: the response pipeline (envelope decoding, error reinterpretation).
//! - [`errors`]: transport and service error types.

pub mod apicall;
pub mod endpoint;
pub mod errors;
pub mod ky_http;
pub mod mock;
pub mod transport;
pub mod trust;

pub use apicall::{ApiCall, Page, PipelinePolicy};
pub use endpoint::{CustomHost, Endpoint, EndpointError, QueryItem};
pub use errors::{ApiFailure, ServiceError, TransportError};
pub use ky_http::{ApiClient, ClientSetupError};
pub use mock::{NetworkMockData, NetworkServicesFailed, NetworkServicesMock};
pub use transport::{ByteFetcher, NetworkService};
pub use trust::{TrustFailureClass, TrustPolicy};
