pub mod error;
pub mod protocol;
pub mod storage;
pub mod utils;
