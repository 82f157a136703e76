pub mod config;
pub mod gcp_auth;
pub mod request_limits;
