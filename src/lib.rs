//! Resolve public video URLs into downloadable variants by driving the AJAX
//! endpoints of y2mate and yt5s, then exchange a variant for a direct link.
//!
//! ```no_run
//! # async fn demo() -> tubegrab::Result<()> {
//! use tubegrab::{config::Config, media::{BackendKind, MediaResolver}};
//!
//! let resolver = MediaResolver::new(&Config::default())?;
//! let catalog = resolver
//!     .resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ", BackendKind::Y2mate)
//!     .await?;
//! if let Some(variant) = catalog.video.get("720p") {
//!     println!("{}", variant.fetch(&resolver).await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod utils;

pub use error::{Error, Result};
