pub mod config;
pub mod inference;
pub mod pipeline;
pub mod preprocess;
pub mod routes;
pub mod storage;
pub mod video;
