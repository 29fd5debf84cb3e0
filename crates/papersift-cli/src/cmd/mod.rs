pub mod digest;
pub mod endpoint;
pub mod feed;
pub mod libraries;
pub mod past;
