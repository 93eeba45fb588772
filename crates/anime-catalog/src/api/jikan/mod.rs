//! REST catalog upstream (Jikan v4, MyAnimeList data).

pub mod client;
pub mod types;

pub use client::JikanClient;
