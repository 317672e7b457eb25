use super::types::{DownloadLink, MediaCatalog, MediaVariant};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

pub fn validate_catalog(catalog: MediaCatalog) -> Result<MediaCatalog> {
    if catalog.id.trim().is_empty() {
        return Err(Error::validation("catalog id is empty"));
    }
    if catalog.title.trim().is_empty() {
        return Err(Error::validation("catalog title is empty"));
    }
    url::Url::parse(&catalog.thumbnail)
        .map_err(|e| Error::validation(format!("invalid thumbnail url: {e}")))?;

    validate_variants("video", &catalog.video)?;
    validate_variants("audio", &catalog.audio)?;

    Ok(catalog)
}

fn validate_variants(kind: &str, variants: &BTreeMap<String, MediaVariant>) -> Result<()> {
    for (key, variant) in variants {
        if variant.quality.is_empty() {
            return Err(Error::validation(format!("{kind} variant has no quality")));
        }
        if *key != variant.quality {
            return Err(Error::validation(format!(
                "{kind} variant keyed {key} reports quality {}",
                variant.quality
            )));
        }
    }
    Ok(())
}

pub fn validate_link(raw: &str) -> Result<DownloadLink> {
    if raw.is_empty() {
        return Err(Error::validation("download link is empty"));
    }
    let parsed =
        url::Url::parse(raw).map_err(|e| Error::validation(format!("invalid download link: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(DownloadLink::new(raw)),
        other => Err(Error::validation(format!(
            "download link has unsupported scheme {other}"
        ))),
    }
}

pub fn require_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::InvalidInput("url must not be empty".to_string()));
    }
    Ok(())
}
