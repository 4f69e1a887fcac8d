use crate::retrieve::endpoint::{CustomHost, Endpoint, EndpointError, QueryItem};

/// Endpoints of the users API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsersEndpoint {
    /// First page of users by reputation, 20 per page.
    Users,
}

impl UsersEndpoint {
    pub fn api(&self) -> &'static str {
        match self {
            UsersEndpoint::Users => "/users",
        }
    }

    pub fn query_items(&self) -> Vec<QueryItem> {
        match self {
            UsersEndpoint::Users => vec![
                QueryItem::new("page", "1"),
                QueryItem::new("pagesize", "20"),
                QueryItem::new("order", "desc"),
                QueryItem::new("sort", "reputation"),
                QueryItem::new("site", "stackoverflow"),
            ],
        }
    }

    pub fn endpoint(&self, custom_host: &CustomHost) -> Result<Endpoint, EndpointError> {
        Endpoint::new(custom_host, self.api(), Some(self.query_items()))
    }
}
