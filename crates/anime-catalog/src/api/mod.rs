//! Upstream catalog clients and the request plumbing they share.
//!
//! Both clients run every call under [`retry::run_with_retry`]; the REST
//! client additionally serializes its calls through a [`RequestQueue`].

pub mod anilist;
pub mod error;
pub mod http;
pub mod jikan;
pub mod request_queue;
pub mod retry;

pub use anilist::AniListClient;
pub use error::CatalogError;
pub use jikan::JikanClient;
pub use request_queue::{QueueConfig, RequestQueue};
pub use retry::RetryPolicy;
