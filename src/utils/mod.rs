pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_backend_url};

/// Generates a dash-less UUID v4, used for request, connection and task ids.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
