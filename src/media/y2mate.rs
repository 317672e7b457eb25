use super::{
    backend::Backend,
    headers::{FORM_CONTENT_TYPE, USER_AGENT, Y2MATE_ORIGIN},
    http::{ensure_status_ok, read_json},
    schema::{require_url, validate_catalog, validate_link},
    types::{
        BackendKind, ConversionTicket, DownloadLink, Locale, MediaCatalog, MediaFormat,
        MediaVariant,
    },
};
use crate::error::{Error, Result};
use crate::utils::parse_file_size;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

const ANALYZE_PATH: &str = "/mates/analyzeV2/ajax";
const CONVERT_PATH: &str = "/mates/convertV2/index";

// Session cookies observed from the site; they age out and need refreshing by hand.
const ANALYZE_COOKIE: &str = "_gid=GA1.2.2055666962.1683248123; _gat_gtag_UA_84863187_21=1; _ga_K8CD7CY0TZ=GS1.1.1683248122.1.1.1683249010.0.0.0; _ga=GA1.1.1570308475.1683248122";
const CONVERT_COOKIE: &str = "_gid=GA1.2.2055666962.1683248123; _ga=GA1.1.1570308475.1683248122; _ga_K8CD7CY0TZ=GS1.1.1683248122.1.1.1683248164.0.0.0; prefetchAd_3381349=true";

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    status: Option<String>,
    #[serde(default)]
    vid: String,
    #[serde(default)]
    title: String,
    t: Option<Value>,
    links: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    #[serde(default)]
    size: String,
    f: String,
    q: String,
    k: String,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    status: Option<String>,
    c_status: Option<String>,
    dlink: Option<String>,
}

/// Client for y2mate's analyze/convert AJAX endpoints.
pub struct Y2mate {
    client: reqwest::Client,
    base_url: String,
    default_locale: Locale,
}

impl Y2mate {
    pub fn new(client: reqwest::Client, base_url: &str, default_locale: Locale) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_locale,
        }
    }

    fn post(&self, path: &str, cookie: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("accept", "*/*")
            .header("content-type", FORM_CONTENT_TYPE)
            .header("cookie", cookie)
            .header("origin", Y2MATE_ORIGIN)
            .header("user-agent", USER_AGENT)
    }

    /// Resolve `url` into a catalog. Unknown locale hints fall back to `en`.
    pub async fn analyze(&self, url: &str, locale_hint: Option<&str>) -> Result<MediaCatalog> {
        require_url(url)?;
        let locale = locale_hint
            .map(Locale::from_hint)
            .unwrap_or(self.default_locale);

        info!("Analyzing {} with y2mate (hl={})", url, locale.as_str());

        let response = self
            .post(ANALYZE_PATH, ANALYZE_COOKIE)
            .form(&[
                ("k_query", url),
                ("k_page", "home"),
                ("hl", locale.as_str()),
                ("q_auto", "0"),
            ])
            .send()
            .await?;

        let (json, raw): (AnalyzeResponse, Value) = read_json(response, "y2mate analyze").await?;
        ensure_status_ok(json.status.as_deref(), &raw)?;

        let links = json
            .links
            .as_ref()
            .and_then(|l| l.as_object())
            .ok_or_else(|| Error::validation("y2mate analyze response has no links"))?;

        let video = collect_variants(&json.vid, links.get("mp4"), MediaFormat::Mp4)?;
        let audio = collect_variants(&json.vid, links.get("mp3"), MediaFormat::Mp3)?;

        debug!(
            "y2mate resolved {}: {} video, {} audio variants",
            json.vid,
            video.len(),
            audio.len()
        );

        validate_catalog(MediaCatalog {
            thumbnail: MediaCatalog::thumbnail_for(&json.vid),
            id: json.vid,
            title: json.title,
            duration: json.t.as_ref().and_then(duration_secs),
            video,
            audio,
        })
    }

    /// Exchange a variant key for its download link in one round trip.
    pub async fn convert(&self, vid: &str, key: &str) -> Result<DownloadLink> {
        info!("Converting {} with y2mate", vid);

        let response = self
            .post(CONVERT_PATH, CONVERT_COOKIE)
            .form(&[("vid", vid), ("k", key)])
            .send()
            .await?;

        let (json, raw): (ConvertResponse, Value) = read_json(response, "y2mate convert").await?;
        ensure_status_ok(json.status.as_deref(), &raw)?;
        debug!("y2mate c_status={:?}", json.c_status);

        let dlink = json
            .dlink
            .ok_or_else(|| Error::validation("y2mate convert response has no dlink"))?;
        validate_link(&dlink)
    }
}

fn collect_variants(
    vid: &str,
    group: Option<&Value>,
    format: MediaFormat,
) -> Result<BTreeMap<String, MediaVariant>> {
    let mut variants = BTreeMap::new();
    let Some(group) = group else {
        return Ok(variants);
    };
    let entries = group.as_object().ok_or_else(|| {
        Error::validation(format!("y2mate {} links are not an object", format.as_str()))
    })?;

    for entry in entries.values() {
        let entry = LinkEntry::deserialize(entry)
            .map_err(|e| Error::validation(format!("malformed y2mate link: {e}")))?;
        if entry.f != format.as_str() {
            continue;
        }
        variants.insert(
            entry.q.clone(),
            MediaVariant {
                size_bytes: parse_file_size(&entry.size),
                size_label: entry.size,
                quality: entry.q,
                ticket: ConversionTicket::Y2mate {
                    vid: vid.to_string(),
                    key: entry.k,
                },
            },
        );
    }

    Ok(variants)
}

fn duration_secs(t: &Value) -> Option<u64> {
    match t {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl Backend for Y2mate {
    fn name(&self) -> &'static str {
        "y2mate"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Y2mate
    }

    async fn resolve(&self, url: &str) -> Result<MediaCatalog> {
        self.analyze(url, None).await
    }

    async fn convert(&self, ticket: &ConversionTicket) -> Result<DownloadLink> {
        match ticket {
            ConversionTicket::Y2mate { vid, key } => Y2mate::convert(self, vid, key).await,
            other => Err(Error::InvalidInput(format!(
                "y2mate cannot convert a {} ticket",
                other.backend()
            ))),
        }
    }
}
