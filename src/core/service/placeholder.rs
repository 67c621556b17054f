// src/core/service/placeholder.rs

//! Synthetic responses served on cache misses so the client's page assembly
//! can progress while the real fetch crosses the bundle link.
//!
//! The body kind is inferred from the URL extension. A static file in the
//! placeholder directory is preferred; when absent a minimal synthetic body
//! is generated. All placeholders are 200s marked `no-store` so browsers ask
//! again and pick up the real content once cached.

use crate::core::model::{Headers, ProxyResponse};
use bytes::Bytes;
use std::path::PathBuf;
use url::Url;

const DEFAULT_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Content on its way</title></head>\n<body>\n<h1>Content on its way</h1>\n<p>This page is being fetched over a delay-tolerant link. Reload in a while.</p>\n</body>\n</html>\n";
const CSS_PLACEHOLDER: &str = "/* stylesheet pending delivery */\n";
const JS_PLACEHOLDER: &str = "// script pending delivery\n";

/// The placeholder families, keyed by what the client is likely to do with
/// the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Html,
    Css,
    Js,
    Image(&'static str),
    Font(&'static str),
}

impl PlaceholderKind {
    /// Infers the placeholder kind from a URL's path extension.
    pub fn from_url(resource_url: &str) -> Self {
        let path = Url::parse(resource_url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| resource_url.to_string());
        let ext = path
            .rsplit('/')
            .next()
            .and_then(|base| base.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()))
            .unwrap_or_default();
        match ext.as_str() {
            "css" => Self::Css,
            "js" | "mjs" => Self::Js,
            "png" => Self::Image("image/png"),
            "jpg" | "jpeg" => Self::Image("image/jpeg"),
            "gif" => Self::Image("image/gif"),
            "svg" => Self::Image("image/svg+xml"),
            "webp" => Self::Image("image/webp"),
            "ico" => Self::Image("image/x-icon"),
            "woff" => Self::Font("font/woff"),
            "woff2" => Self::Font("font/woff2"),
            "ttf" => Self::Font("font/ttf"),
            "otf" => Self::Font("font/otf"),
            _ => Self::Html,
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Css => "text/css; charset=utf-8",
            Self::Js => "text/javascript; charset=utf-8",
            Self::Image(mime) | Self::Font(mime) => mime,
        }
    }

    /// File name of the static asset preferred over the synthetic body.
    fn static_file_name(&self, default_file: &str) -> String {
        match self {
            Self::Html => default_file.to_string(),
            Self::Css => "placeholder.css".to_string(),
            Self::Js => "placeholder.js".to_string(),
            Self::Image(_) | Self::Font(_) => String::new(),
        }
    }

    fn synthetic_body(&self) -> Bytes {
        match self {
            Self::Html => Bytes::from_static(DEFAULT_PAGE.as_bytes()),
            Self::Css => Bytes::from_static(CSS_PLACEHOLDER.as_bytes()),
            Self::Js => Bytes::from_static(JS_PLACEHOLDER.as_bytes()),
            Self::Image(_) | Self::Font(_) => Bytes::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaceholderProvider {
    dir: PathBuf,
    default_file: String,
}

impl PlaceholderProvider {
    pub fn new(dir: impl Into<PathBuf>, default_file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            default_file: default_file.into(),
        }
    }

    /// Builds the placeholder response for a missed resource.
    pub async fn response_for(&self, resource_url: &str) -> ProxyResponse {
        let kind = PlaceholderKind::from_url(resource_url);

        let body = match self.static_body(kind).await {
            Some(body) => body,
            None => kind.synthetic_body(),
        };

        let mut response = ProxyResponse::new(200, body, kind.content_type());
        response.headers = no_store_headers();
        response
    }

    async fn static_body(&self, kind: PlaceholderKind) -> Option<Bytes> {
        let file_name = kind.static_file_name(&self.default_file);
        if file_name.is_empty() {
            return None;
        }
        tokio::fs::read(self.dir.join(file_name))
            .await
            .ok()
            .map(Bytes::from)
    }
}

fn no_store_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert(
        "Cache-Control".to_string(),
        vec!["no-store, no-cache, must-revalidate".to_string()],
    );
    headers.insert("Pragma".to_string(), vec!["no-cache".to_string()]);
    headers
}
