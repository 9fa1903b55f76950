//! yt-dlp resolver and catalog
//!
//! Runs the `yt-dlp` executable and reads its single-JSON dump:
//! - resolve: `-f bestaudio/best --no-playlist` for the stream URL and metadata
//! - expand: `--flat-playlist` for playlist members without resolving each
//! - search: `<prefix><query>` (default `ytsearch1:`) for the best match
//!
//! Music catalog links (open.spotify.com) need a catalog API backend, which
//! this adapter does not provide.

use async_trait::async_trait;
use roomq_common::SourceRef;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::playback::RequestKind;
use crate::services::{
    CatalogEntry, CatalogService, Expansion, ExpansionKind, Resolved, Resolver, SearchHit,
    StreamHandle,
};

const UNKNOWN_TITLE: &str = "Unknown Title";

pub struct YtDlp {
    config: ResolverConfig,
}

impl YtDlp {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    async fn dump_json(&self, args: &[&str], target: &str, wrap: fn(String) -> Error) -> Result<Value> {
        let program = &self.config.program;
        let mut command = Command::new(program);
        command
            .args(["--dump-single-json", "--no-warnings", "--quiet"])
            .args(args);
        if let Some(cookies) = &self.config.cookies_file {
            command.arg("--cookies").arg(cookies);
        }
        command
            .arg("--")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program, target, "Running yt-dlp");

        let output = time::timeout(self.config.timeout(), command.output())
            .await
            .map_err(|_| {
                wrap(format!(
                    "{} timed out after {}s",
                    program, self.config.timeout_secs
                ))
            })?
            .map_err(|e| wrap(format!("Failed to execute {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(wrap(format!("{} failed: {}", program, stderr.trim())));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| wrap(format!("Failed to parse {} output: {}", program, e)))
    }
}

#[async_trait]
impl Resolver for YtDlp {
    async fn resolve(&self, source: &SourceRef) -> Result<Resolved> {
        let info = self
            .dump_json(
                &["-f", "bestaudio/best", "--no-playlist"],
                source.as_str(),
                Error::Resolution,
            )
            .await?;
        parse_resolved(&info)
    }
}

#[async_trait]
impl CatalogService for YtDlp {
    async fn expand(&self, link: &str) -> Result<Expansion> {
        if RequestKind::classify(link) == RequestKind::CatalogLink {
            return Err(Error::Catalog(
                "Music catalog links are not supported by the yt-dlp backend".to_string(),
            ));
        }
        let info = self
            .dump_json(&["--flat-playlist", "--yes-playlist"], link, Error::Catalog)
            .await?;
        Ok(parse_expansion(&info))
    }

    async fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        let target = format!("{}{}", self.config.search_prefix, query);
        let info = self
            .dump_json(&["--flat-playlist"], &target, Error::Catalog)
            .await?;
        Ok(parse_search(&info))
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Stream URL plus metadata; a playlist dump yields its first entry
pub fn parse_resolved(info: &Value) -> Result<Resolved> {
    let info = match info.get("entries").and_then(Value::as_array) {
        Some(entries) => entries
            .first()
            .ok_or_else(|| Error::Resolution("Playlist has no entries".to_string()))?,
        None => info,
    };

    let stream = str_field(info, "url")
        .ok_or_else(|| Error::Resolution("No playable stream in metadata".to_string()))?;

    Ok(Resolved {
        stream: StreamHandle::new(stream),
        title: str_field(info, "title").unwrap_or(UNKNOWN_TITLE).to_string(),
        duration_secs: info
            .get("duration")
            .and_then(Value::as_f64)
            .filter(|d| *d > 0.0)
            .map(|d| d as u64),
        artist: str_field(info, "artist")
            .or_else(|| str_field(info, "uploader"))
            .map(str::to_string),
        thumbnail: str_field(info, "thumbnail").map(str::to_string),
    })
}

/// Single item or flat playlist
pub fn parse_expansion(info: &Value) -> Expansion {
    match info.get("entries").and_then(Value::as_array) {
        Some(entries) => Expansion {
            kind: ExpansionKind::Collection,
            title: str_field(info, "title").map(str::to_string),
            entries: entries
                .iter()
                .filter_map(|entry| {
                    let url = str_field(entry, "url")?;
                    let title = str_field(entry, "title").map(str::to_string);
                    Some(CatalogEntry::source(url, title))
                })
                .collect(),
        },
        None => {
            let link = str_field(info, "original_url")
                .or_else(|| str_field(info, "webpage_url"))
                .or_else(|| str_field(info, "url"));
            Expansion {
                kind: ExpansionKind::Single,
                title: None,
                entries: link
                    .map(|url| {
                        CatalogEntry::source(
                            url,
                            Some(str_field(info, "title").unwrap_or(UNKNOWN_TITLE).to_string()),
                        )
                    })
                    .into_iter()
                    .collect(),
            }
        }
    }
}

/// First search result, if any
pub fn parse_search(info: &Value) -> Option<SearchHit> {
    let first = info.get("entries")?.as_array()?.first()?;
    let url = str_field(first, "url").or_else(|| str_field(first, "webpage_url"))?;
    Some(SearchHit {
        source: SourceRef::new(url),
        title: str_field(first, "title").map(str::to_string),
    })
}
