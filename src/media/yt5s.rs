use super::{
    backend::Backend,
    headers::{FORM_CONTENT_TYPE, USER_AGENT, YT5S_CLIENT, YT5S_ORIGIN, YT5S_REFERER},
    http::{ensure_status_ok, read_json},
    push,
    schema::{require_url, validate_catalog},
    types::{
        BackendKind, ConversionTicket, ConvertRequest, DownloadLink, MediaCatalog, MediaFormat,
        MediaVariant,
    },
};
use crate::error::{Error, Result};
use crate::utils::parse_file_size;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_COOKIE: &str = "__cflb=04dToSoFRg9oqH9pYF2En9gKJK4fe8D9TcYtUD6tYu; _ga=GA1.2.1350132744.1641709803; _gid=GA1.2.1492233267.1641709803; _gat_gtag_UA_122831834_4=1";
const REQUESTED_KEY: &str = "de0cfuirtgf67a";

static SEARCH_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"k_url_search="(.*?)""#).unwrap());
static CONVERT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"k_url_convert="(.*?)""#).unwrap());
static KBPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)kbps").unwrap());

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: Option<String>,
    #[serde(default)]
    vid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    token: String,
    #[serde(rename = "timeExpires")]
    time_expires: Option<Value>,
    #[serde(rename = "fn", default)]
    filename: String,
    links: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct VideoLink {
    k: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct AudioLink {
    key: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct ServerSelection {
    c_server: Option<String>,
    d_url: Option<String>,
    c_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConvertResult {
    #[serde(rename = "statusCode")]
    status_code: Option<Value>,
    #[serde(rename = "jobId")]
    job_id: Option<Value>,
    result: Option<String>,
}

/// Endpoints scraped from the yt5s home page.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub search: String,
    pub convert: String,
}

/// Client for yt5s, whose conversions may be queued and finished over a push channel.
pub struct Yt5s {
    client: reqwest::Client,
    home_url: String,
    push_timeout: Duration,
}

impl Yt5s {
    pub fn new(client: reqwest::Client, home_url: &str, push_timeout: Duration) -> Self {
        Self {
            client,
            home_url: home_url.to_string(),
            push_timeout,
        }
    }

    pub async fn endpoints(&self) -> Result<Endpoints> {
        debug!("Fetching yt5s home page {}", self.home_url);
        let html = self
            .client
            .get(&self.home_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        scrape_endpoints(&self.home_url, &html)
    }

    /// Resolve `url` into a catalog using the endpoints advertised on the home page.
    pub async fn analyze(&self, url: &str) -> Result<MediaCatalog> {
        require_url(url)?;
        info!("Analyzing {} with yt5s", url);

        let endpoints = self.endpoints().await?;
        let response = self
            .client
            .post(&endpoints.search)
            .header("content-type", FORM_CONTENT_TYPE)
            .header("cookie", SEARCH_COOKIE)
            .header("origin", YT5S_ORIGIN)
            .header("user-agent", USER_AGENT)
            .query(&[("q", url), ("vt", "home")])
            .send()
            .await?;

        let (json, raw): (SearchResponse, Value) = read_json(response, "yt5s search").await?;
        ensure_status_ok(json.status.as_deref(), &raw)?;

        let expires = json
            .time_expires
            .as_ref()
            .and_then(parse_expiry)
            .ok_or_else(|| Error::validation("yt5s search response has no timeExpires"))?;
        let links = json
            .links
            .as_ref()
            .and_then(|l| l.as_object())
            .ok_or_else(|| Error::validation("yt5s search response has no links"))?;

        let base = ConvertRequest {
            server: endpoints.convert,
            vid: json.vid.clone(),
            format: MediaFormat::Mp4,
            quality: String::new(),
            token: json.token,
            expires,
            filename: json.filename,
        };

        let mut video = BTreeMap::new();
        for entry in group(links.get("mp4"), "mp4")? {
            let link = VideoLink::deserialize(entry)
                .map_err(|e| Error::validation(format!("malformed yt5s video link: {e}")))?;
            video.insert(
                link.k.clone(),
                MediaVariant {
                    quality: link.k.clone(),
                    size_bytes: parse_file_size(&link.size),
                    size_label: link.size,
                    ticket: ConversionTicket::Yt5s(ConvertRequest {
                        quality: link.k,
                        ..base.clone()
                    }),
                },
            );
        }

        let mut audio = BTreeMap::new();
        for entry in group(links.get("mp3"), "mp3")? {
            let link = AudioLink::deserialize(entry)
                .map_err(|e| Error::validation(format!("malformed yt5s audio link: {e}")))?;
            audio.insert(
                link.key.clone(),
                MediaVariant {
                    quality: link.key.clone(),
                    size_bytes: parse_file_size(&link.size),
                    size_label: link.size,
                    ticket: ConversionTicket::Yt5s(ConvertRequest {
                        format: MediaFormat::Mp3,
                        quality: strip_kbps(&link.key),
                        ..base.clone()
                    }),
                },
            );
        }

        debug!(
            "yt5s resolved {}: {} video, {} audio variants",
            json.vid,
            video.len(),
            audio.len()
        );

        validate_catalog(MediaCatalog {
            thumbnail: MediaCatalog::thumbnail_for(&json.vid),
            id: json.vid,
            title: json.title,
            duration: None,
            video,
            audio,
        })
    }

    /// Ask for a conversion server, then convert there, waiting on the push
    /// channel when the job is queued.
    pub async fn convert(&self, request: &ConvertRequest) -> Result<DownloadLink> {
        info!(
            "Converting {} ({} {}) with yt5s",
            request.vid,
            request.format.as_str(),
            request.quality
        );
        let expires = request.expires.to_string();

        let response = self
            .client
            .post(&request.server)
            .header("content-type", FORM_CONTENT_TYPE)
            .header("origin", YT5S_ORIGIN)
            .header("referer", YT5S_REFERER)
            .header("user-agent", USER_AGENT)
            .header("X-Requested-Key", REQUESTED_KEY)
            .form(&[
                ("v_id", request.vid.as_str()),
                ("ftype", request.format.as_str()),
                ("fquality", request.quality.as_str()),
                ("token", request.token.as_str()),
                ("timeExpire", expires.as_str()),
                ("client", YT5S_CLIENT),
            ])
            .send()
            .await?;

        let (selection, _): (ServerSelection, Value) =
            read_json(response, "yt5s server selection").await?;
        debug!("yt5s c_status={:?}", selection.c_status);

        let server = match selection.c_server.filter(|s| !s.is_empty()) {
            Some(server) => server,
            None if request.format == MediaFormat::Mp3 => {
                // No server assigned: take whatever d_url carries, possibly nothing.
                warn!("yt5s assigned no conversion server for {}", request.vid);
                return Ok(DownloadLink::new(selection.d_url.unwrap_or_default()));
            }
            None => {
                return Err(Error::validation(format!(
                    "yt5s assigned no conversion server for {}",
                    request.vid
                )))
            }
        };

        let response = self
            .client
            .post(format!("{}/api/json/convert", server.trim_end_matches('/')))
            .form(&[
                ("v_id", request.vid.as_str()),
                ("ftype", request.format.as_str()),
                ("fquality", request.quality.as_str()),
                ("fname", request.filename.as_str()),
                ("token", request.token.as_str()),
                ("timeExpire", expires.as_str()),
            ])
            .send()
            .await?;

        let (result, raw): (ConvertResult, Value) = read_json(response, "yt5s convert").await?;
        match result.status_code.as_ref().and_then(Value::as_i64) {
            Some(200) => result
                .result
                .map(DownloadLink::new)
                .ok_or_else(|| Error::validation("yt5s convert finished without a result")),
            Some(300) => {
                let job_id = result
                    .job_id
                    .as_ref()
                    .and_then(job_id_string)
                    .ok_or_else(|| Error::validation("yt5s queued a job without a jobId"))?;
                info!("yt5s queued job {} on {}", job_id, server);
                push::await_job(&server, &job_id, self.push_timeout).await
            }
            _ => Err(Error::Backend(raw)),
        }
    }
}

fn scrape_endpoints(home_url: &str, html: &str) -> Result<Endpoints> {
    let base = url::Url::parse(home_url)
        .map_err(|e| Error::validation(format!("invalid yt5s home url: {e}")))?;
    let find = |re: &Regex, name: &str| -> Result<String> {
        let raw = re
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation(format!("yt5s home page has no {name}")))?;
        base.join(raw)
            .map(|u| u.to_string())
            .map_err(|e| Error::validation(format!("invalid {name} {raw}: {e}")))
    };

    Ok(Endpoints {
        search: find(&SEARCH_URL_RE, "k_url_search")?,
        convert: find(&CONVERT_URL_RE, "k_url_convert")?,
    })
}

fn group<'a>(value: Option<&'a Value>, name: &str) -> Result<impl Iterator<Item = &'a Value>> {
    value
        .and_then(|v| v.as_object())
        .map(|entries| entries.values())
        .ok_or_else(|| Error::validation(format!("yt5s search response has no {name} links")))
}

fn strip_kbps(key: &str) -> String {
    KBPS_RE.replace(key, "").into_owned()
}

/// `timeExpires` arrives as a string or a number; leading digits win like `parseInt`.
fn parse_expiry(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

fn job_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Backend for Yt5s {
    fn name(&self) -> &'static str {
        "yt5s"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Yt5s
    }

    async fn resolve(&self, url: &str) -> Result<MediaCatalog> {
        self.analyze(url).await
    }

    async fn convert(&self, ticket: &ConversionTicket) -> Result<DownloadLink> {
        match ticket {
            ConversionTicket::Yt5s(request) => Yt5s::convert(self, request).await,
            other => Err(Error::InvalidInput(format!(
                "yt5s cannot convert a {} ticket",
                other.backend()
            ))),
        }
    }
}
