pub mod bucket;
pub mod documents;
pub mod index;
pub mod liveness;
pub mod query;
pub mod upload;
