mod backend;
mod headers;
mod http;
pub mod push;
mod schema;
mod types;
pub mod y2mate;
pub mod yt5s;

pub use backend::Backend;
pub use schema::{validate_catalog, validate_link};
pub use types::{
    BackendKind, ConversionTicket, ConvertRequest, DownloadLink, Locale, MediaCatalog,
    MediaFormat, MediaKind, MediaVariant,
};

use crate::config::Config;
use crate::error::{Error, Result};
use tracing::{info, warn};
use y2mate::Y2mate;
use yt5s::Yt5s;

pub struct MediaResolver {
    y2mate: Y2mate,
    yt5s: Yt5s,
}

impl MediaResolver {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        info!("Media resolver initialized with y2mate and yt5s backends");

        Ok(Self {
            y2mate: Y2mate::new(
                client.clone(),
                &config.y2mate.base_url,
                Locale::from_hint(&config.y2mate.default_locale),
            ),
            yt5s: Yt5s::new(client, &config.yt5s.home_url, config.push_timeout()),
        })
    }

    /// Backends in the order [`MediaResolver::resolve_any`] tries them.
    fn backends(&self) -> [&dyn Backend; 2] {
        [&self.y2mate, &self.yt5s]
    }

    fn backend(&self, kind: BackendKind) -> &dyn Backend {
        match kind {
            BackendKind::Y2mate => &self.y2mate,
            BackendKind::Yt5s => &self.yt5s,
        }
    }

    pub fn y2mate(&self) -> &Y2mate {
        &self.y2mate
    }

    pub fn yt5s(&self) -> &Yt5s {
        &self.yt5s
    }

    pub async fn resolve(&self, url: &str, kind: BackendKind) -> Result<MediaCatalog> {
        self.backend(kind).resolve(url).await
    }

    pub async fn resolve_y2mate(
        &self,
        url: &str,
        locale_hint: Option<&str>,
    ) -> Result<MediaCatalog> {
        self.y2mate.analyze(url, locale_hint).await
    }

    /// Tries each backend once, in order, and returns the first catalog.
    pub async fn resolve_any(&self, url: &str) -> Result<(BackendKind, MediaCatalog)> {
        info!("Resolving {} with any backend", url);

        let mut errors = Vec::new();

        for backend in self.backends() {
            match backend.resolve(url).await {
                Ok(catalog) => {
                    info!("Resolved with {}", backend.name());
                    return Ok((backend.kind(), catalog));
                }
                Err(e @ Error::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    warn!("{} failed: {}", backend.name(), e);
                    errors.push(format!("{}: {e}", backend.name()));
                }
            }
        }

        Err(Error::AllBackendsFailed(errors.join(". ")))
    }

    /// Converts `variant` with the backend that issued its ticket.
    pub async fn fetch(&self, variant: &MediaVariant) -> Result<DownloadLink> {
        self.backend(variant.ticket.backend())
            .convert(&variant.ticket)
            .await
    }
}

impl MediaVariant {
    /// Ask the issuing backend for this variant's download link.
    ///
    /// Every call is a fresh exchange with the backend.
    pub async fn fetch(&self, resolver: &MediaResolver) -> Result<DownloadLink> {
        resolver.fetch(self).await
    }
}
