//! Header names and route fragments shared across services.

/// Correlation id header carried on every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Channel id header identifying the calling channel.
pub const CHANNEL_ID_HEADER: &str = "x-channel-id";

/// Header carrying the service API key.
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

/// Headers every caller is expected to send.
pub const REQUIRED_REQUEST_HEADERS: [&str; 2] = [REQUEST_ID_HEADER, CHANNEL_ID_HEADER];

/// Global path prefix for versioned API routes.
pub const API_PREFIX: &str = "api";

/// Path of the aggregate health endpoint (excluded from [`API_PREFIX`]).
pub const HEALTH_ROUTE: &str = "health";

/// Fixed message returned when the service key is missing or unknown.
pub const INVALID_SERVICE_KEY_MESSAGE: &str = "Please pass a valid service key to authenticate.";

/// Builds the versioned mount path for a controller, e.g. `/api/v1/customer`.
pub fn versioned_path(version: &str, controller: &str) -> String {
    format!("/{}/v{}/{}", API_PREFIX, version, controller.trim_matches('/'))
}
