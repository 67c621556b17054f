// tests/property/path_props.rs

//! Sanitization safety and path-derivation determinism for arbitrary input.

use bundlecache::core::model::ProxyRequest;
use bundlecache::core::model::cache_path::{CachePathInfo, sanitize_for_path};
use proptest::prelude::*;
use std::path::Path;
use url::Url;

proptest! {
    /// Sanitized output never contains traversal components, separator-hostile
    /// characters, or empty segments, and is never empty itself.
    #[test]
    fn prop_sanitize_output_is_safe(input in ".{0,80}") {
        let out = sanitize_for_path(&input);
        prop_assert!(!out.is_empty());
        for segment in out.split('/') {
            prop_assert!(!segment.is_empty());
            prop_assert_ne!(segment, "..");
        }
        for c in out.chars() {
            prop_assert!(!matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'));
        }
    }

    /// Sanitization is a pure function.
    #[test]
    fn prop_sanitize_deterministic(input in ".{0,80}") {
        prop_assert_eq!(sanitize_for_path(&input), sanitize_for_path(&input));
    }

    /// Every derivable cache path resolves strictly under the cache root.
    #[test]
    fn prop_derived_path_stays_under_root(
        path in "[a-zA-Z0-9._/%-]{0,60}",
        content_type in prop_oneof![
            Just("text/html"),
            Just("text/css"),
            Just("image/png"),
            Just("application/json"),
            Just("font/woff2"),
            Just("application/octet-stream"),
        ],
    ) {
        let url = format!("http://prop.test/{path}");
        prop_assume!(Url::parse(&url).is_ok());
        let key = format!("GET|{url}");

        let info = CachePathInfo::derive(&url, content_type, &key).unwrap();
        let root = Path::new("/srv/bundlecache");
        let resolved = info.absolute_under(root);
        prop_assert!(resolved.starts_with(root));
        prop_assert!(!resolved.components().any(|c| c.as_os_str() == ".."));
        prop_assert!(!info.file_name.is_empty());
    }

    /// Path derivation is pure: equal inputs, equal outputs.
    #[test]
    fn prop_derive_deterministic(
        path in "[a-zA-Z0-9._/-]{0,40}",
        content_type in prop_oneof![Just("text/html"), Just("text/css"), Just("image/gif")],
    ) {
        let url = format!("http://prop.test/{path}");
        prop_assume!(Url::parse(&url).is_ok());
        let key = format!("GET|{url}");
        let a = CachePathInfo::derive(&url, content_type, &key);
        let b = CachePathInfo::derive(&url, content_type, &key);
        prop_assert_eq!(a.ok(), b.ok());
    }

    /// Fingerprints agree exactly when method and URL agree.
    #[test]
    fn prop_fingerprint_equality(
        method_a in prop_oneof![Just("GET"), Just("HEAD"), Just("POST")],
        method_b in prop_oneof![Just("GET"), Just("HEAD"), Just("POST")],
        path_a in "[a-z0-9/]{0,16}",
        path_b in "[a-z0-9/]{0,16}",
    ) {
        let url_a = format!("http://prop.test/{path_a}");
        let url_b = format!("http://prop.test/{path_b}");
        let a = ProxyRequest::new(method_a, url_a.clone());
        let b = ProxyRequest::new(method_b, url_b.clone());
        let same = method_a == method_b && url_a == url_b;
        prop_assert_eq!(a.fingerprint() == b.fingerprint(), same);
    }
}
