//! # Users
//!
//! The users-listing API: endpoint definition, wire models and a fetch
//! helper running through the response pipeline.

pub mod endpoint;
pub mod model;

pub use endpoint::UsersEndpoint;
pub use model::{BadgeCounts, User};

use crate::retrieve::apicall::ApiCall;
use crate::retrieve::errors::ServiceError;

/// Fetches the first page of users from the host `api` is configured for.
pub async fn fetch_users(api: &ApiCall) -> Result<Vec<User>, ServiceError> {
    let endpoint = UsersEndpoint::Users.endpoint(api.custom_host())?;
    api.get_list(endpoint.url()).await
}
