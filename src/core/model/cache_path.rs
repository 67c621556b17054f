// src/core/model/cache_path.rs

//! Derives the deterministic filesystem layout for cached bodies from the
//! request URL and the response content type.
//!
//! The resulting layout is `<host>/<path>[/<sub_dir>]/<file_name>` relative to
//! the configured cache directory. Sanitization strips `..` and replaces
//! filesystem-hostile characters, so the result can never escape the root.

use crate::core::errors::BundleCacheError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// The components of a cache file location, relative to the cache root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePathInfo {
    /// Sanitized URL host.
    pub host: String,
    /// Sanitized URL path, `/`-hierarchy preserved; `root` for trivial paths.
    pub path: String,
    /// Content-type bucket (`css`, `js`, `images`, `fonts`) or empty.
    pub sub_dir: String,
    /// Final file name with a content-type-mapped extension.
    pub file_name: String,
}

impl CachePathInfo {
    /// Derives the cache location for a resource. `cache_key` is the request
    /// fingerprint; it names directory-style resources whose content is not
    /// HTML, where no natural basename exists.
    pub fn derive(
        resource_url: &str,
        content_type: &str,
        cache_key: &str,
    ) -> Result<Self, BundleCacheError> {
        if resource_url.is_empty() {
            return Err(BundleCacheError::InvalidUrl("resource URL is empty".into()));
        }

        let parsed = Url::parse(resource_url)?;
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => sanitize_for_path(h),
            _ => return Err(BundleCacheError::EmptyHost),
        };

        let url_path = parsed.path();
        let path = sanitize_for_path(if url_path.is_empty() { "/" } else { url_path });

        let ext = extension_for_content_type(content_type);
        let sub_dir = sub_directory_for_content_type(content_type).to_string();

        let file_name = if url_path.ends_with('/') || url_path.is_empty() || url_path == "/" {
            if ext == ".html" {
                "index.html".to_string()
            } else {
                // Directory-style URL with non-HTML content: no usable
                // basename, fall back to the fingerprint digest.
                format!("{}{}", fingerprint_digest(cache_key), ext)
            }
        } else {
            let base = url_path.rsplit('/').next().unwrap_or_default();
            let stem = match base.rfind('.') {
                Some(idx) => &base[..idx],
                None => base,
            };
            format!("{stem}{ext}")
        };

        Ok(Self {
            host,
            path,
            sub_dir,
            file_name,
        })
    }

    /// The location relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        let mut p = PathBuf::from(&self.host);
        p.push(&self.path);
        if !self.sub_dir.is_empty() {
            p.push(&self.sub_dir);
        }
        p.push(&self.file_name);
        p
    }

    /// The absolute location under the given cache root.
    pub fn absolute_under(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.relative_path())
    }
}

/// SHA-256 of the cache key, hex-encoded. Used as a file name stem; identity
/// lives in the metadata key, not the filesystem path.
pub fn fingerprint_digest(cache_key: &str) -> String {
    hex::encode(Sha256::digest(cache_key.as_bytes()))
}

/// Converts a host or URL path into a safe relative path. `..` sequences are
/// removed, empty segments dropped, and `\ : * ? " < > |` replaced with `_`.
/// `/` separators are kept so the URL hierarchy survives on disk. A path with
/// no surviving segments becomes `root`.
pub fn sanitize_for_path(path: &str) -> String {
    let without_traversal = path.replace("..", "");

    let sanitized: Vec<String> = without_traversal
        .split('/')
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let replaced: String = part
                .chars()
                .map(|c| match c {
                    '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                    other => other,
                })
                .collect();
            let trimmed = replaced.trim_matches('_');
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect();

    if sanitized.is_empty() {
        "root".to_string()
    } else {
        sanitized.join("/")
    }
}

/// Maps a content type to the file extension used on disk. Tries the full
/// header value first, then the bare media type, then type prefixes; unknown
/// types are treated as HTML pages.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    if let Some(ext) = extension_exact(content_type) {
        return ext;
    }
    let main_type = main_media_type(content_type);
    if let Some(ext) = extension_exact(main_type) {
        return ext;
    }
    if let Some(subtype) = main_type.strip_prefix("image/") {
        return match subtype {
            "jpeg" | "jpg" => ".jpg",
            "png" => ".png",
            "gif" => ".gif",
            "svg+xml" => ".svg",
            "webp" => ".webp",
            "x-icon" | "vnd.microsoft.icon" => ".ico",
            _ => ".html",
        };
    }
    ".html"
}

/// Maps a content type to its storage subdirectory, or `""` for content that
/// lives at the resource path itself (HTML and friends).
pub fn sub_directory_for_content_type(content_type: &str) -> &'static str {
    if let Some(dir) = sub_dir_exact(content_type) {
        return dir;
    }
    let main_type = main_media_type(content_type);
    if let Some(dir) = sub_dir_exact(main_type) {
        return dir;
    }
    if main_type.starts_with("image/") {
        return "images";
    }
    if main_type.starts_with("font/") || main_type.starts_with("application/font") {
        return "fonts";
    }
    ""
}

/// Strips parameters (`; charset=...`) from a content-type header value.
fn main_media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
}

fn extension_exact(value: &str) -> Option<&'static str> {
    Some(match value {
        "text/html" | "text/html; charset=utf-8" | "text/html; charset=UTF-8" => ".html",
        "text/css" | "text/css; charset=utf-8" => ".css",
        "application/javascript"
        | "application/x-javascript"
        | "text/javascript"
        | "text/javascript; charset=utf-8" => ".js",
        "application/json" | "application/json; charset=utf-8" => ".json",
        "application/xml" | "text/xml" | "text/xml; charset=utf-8" => ".xml",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "font/woff" | "application/font-woff" => ".woff",
        "font/woff2" | "application/font-woff2" => ".woff2",
        "font/ttf" | "application/x-font-ttf" => ".ttf",
        "font/otf" | "application/x-font-opentype" => ".otf",
        "application/pdf" => ".pdf",
        "text/plain" | "text/plain; charset=utf-8" => ".txt",
        "application/octet-stream" => ".bin",
        _ => return None,
    })
}

fn sub_dir_exact(value: &str) -> Option<&'static str> {
    Some(match value {
        "text/css" => "css",
        "application/javascript" | "application/x-javascript" | "text/javascript" => "js",
        "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/svg+xml"
        | "image/webp" | "image/x-icon" | "image/vnd.microsoft.icon" => "images",
        "font/woff" | "font/woff2" | "application/font-woff" | "application/font-woff2"
        | "font/ttf" | "application/x-font-ttf" | "font/otf" | "application/x-font-opentype" => {
            "fonts"
        }
        _ => return None,
    })
}
