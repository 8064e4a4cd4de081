//! Request classification.
//!
//! Pure function of the URL shape: origin, path, extension and host. No
//! network access and no storage reads happen here.

use postcache_core::{AppConfig, ConfigError, PartitionRole, Request};
use serde::Serialize;
use std::collections::HashSet;
use url::{Origin, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    StaticAsset,
    UpstreamApi,
    ThirdPartyAsset,
    Other,
}

impl Classification {
    /// Partition an entry of this class is stored in.
    pub fn partition_role(self) -> PartitionRole {
        match self {
            Classification::StaticAsset => PartitionRole::Static,
            _ => PartitionRole::Dynamic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::StaticAsset => "static-asset",
            Classification::UpstreamApi => "upstream-api",
            Classification::ThirdPartyAsset => "third-party-asset",
            Classification::Other => "other",
        }
    }
}

/// Classifier built once from the pre-declared asset lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Origin,
    static_paths: HashSet<String>,
    static_extensions: Vec<String>,
    upstream_hosts: [String; 2],
    third_party_hosts: Vec<String>,
    third_party_assets: HashSet<String>,
}

impl Classifier {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the site origin does not parse.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let origin = config.site_origin_url()?;
        let third_party_assets = config
            .third_party_assets
            .iter()
            .filter_map(|raw| Url::parse(raw).ok())
            .map(|u| u.to_string())
            .collect();

        Ok(Self {
            origin: origin.origin(),
            static_paths: config.static_assets.iter().cloned().collect(),
            static_extensions: config.static_extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            upstream_hosts: [
                config.upstream.api_host.to_ascii_lowercase(),
                config.upstream.raw_host.to_ascii_lowercase(),
            ],
            third_party_hosts: config.third_party_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            third_party_assets,
        })
    }

    /// Classify a request, or `None` if it bypasses the cache layer
    /// (non-GET or non-http(s)).
    pub fn classify(&self, request: &Request) -> Option<Classification> {
        if !request.is_cacheable() {
            return None;
        }
        let url = &request.url;

        if self.is_static(url) {
            Some(Classification::StaticAsset)
        } else if self.is_upstream(url) {
            Some(Classification::UpstreamApi)
        } else if self.is_third_party(url) {
            Some(Classification::ThirdPartyAsset)
        } else {
            Some(Classification::Other)
        }
    }

    fn is_static(&self, url: &Url) -> bool {
        if url.origin() != self.origin {
            return false;
        }
        let path = url.path();
        if path == "/" || self.static_paths.contains(path) {
            return true;
        }
        let lower = path.to_ascii_lowercase();
        self.static_extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    fn is_upstream(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| self.upstream_hosts.iter().any(|h| h == host))
    }

    fn is_third_party(&self, url: &Url) -> bool {
        let host_listed = url.host_str().is_some_and(|host| {
            self.third_party_hosts
                .iter()
                .any(|h| host == h || host.strip_suffix(h.as_str()).is_some_and(|rest| rest.ends_with('.')))
        });
        host_listed || self.third_party_assets.contains(url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::from_config(&AppConfig::default()).unwrap()
    }

    fn classify(url: &str) -> Option<Classification> {
        classifier().classify(&Request::parse_get(url).unwrap())
    }

    #[test]
    fn test_site_root_is_static() {
        assert_eq!(classify("https://bambans.github.io/"), Some(Classification::StaticAsset));
    }

    #[test]
    fn test_declared_path_is_static() {
        assert_eq!(classify("https://bambans.github.io/blog/"), Some(Classification::StaticAsset));
    }

    #[test]
    fn test_extension_is_static() {
        assert_eq!(classify("https://bambans.github.io/js/new-widget.js"), Some(Classification::StaticAsset));
        assert_eq!(classify("https://bambans.github.io/about.HTML"), Some(Classification::StaticAsset));
    }

    #[test]
    fn test_extension_on_foreign_origin_is_not_static() {
        assert_eq!(classify("https://example.com/app.js"), Some(Classification::Other));
        assert_eq!(classify("http://bambans.github.io/app.js"), Some(Classification::Other));
    }

    #[test]
    fn test_upstream_hosts() {
        assert_eq!(
            classify("https://api.github.com/repos/bambans/bambans.github.io/contents/blog/posts?ref=main"),
            Some(Classification::UpstreamApi)
        );
        assert_eq!(
            classify("https://raw.githubusercontent.com/bambans/bambans.github.io/main/blog/posts/a.md"),
            Some(Classification::UpstreamApi)
        );
    }

    #[test]
    fn test_third_party_host_and_subdomain() {
        assert_eq!(classify("https://cdn.tailwindcss.com/"), Some(Classification::ThirdPartyAsset));
        assert_eq!(classify("https://fastly.cdn.jsdelivr.net/x.js"), Some(Classification::ThirdPartyAsset));
        assert_eq!(classify("https://notcdn.jsdelivr.net.evil.com/x.js"), Some(Classification::Other));
    }

    #[test]
    fn test_third_party_exact_url() {
        let config = AppConfig {
            third_party_hosts: vec![],
            third_party_assets: vec!["https://unpkg.com/htmx.org@1.9.0".into()],
            ..Default::default()
        };
        let classifier = Classifier::from_config(&config).unwrap();
        let hit = Request::parse_get("https://unpkg.com/htmx.org@1.9.0").unwrap();
        let miss = Request::parse_get("https://unpkg.com/htmx.org@2.0.0").unwrap();
        assert_eq!(classifier.classify(&hit), Some(Classification::ThirdPartyAsset));
        assert_eq!(classifier.classify(&miss), Some(Classification::Other));
    }

    #[test]
    fn test_other() {
        assert_eq!(classify("https://bambans.github.io/blog/posts/feed"), Some(Classification::Other));
    }

    #[test]
    fn test_bypass() {
        let c = classifier();
        let post = Request::new("POST", Url::parse("https://bambans.github.io/").unwrap());
        assert_eq!(c.classify(&post), None);
        let ext = Request::get(Url::parse("chrome-extension://abc/app.js").unwrap());
        assert_eq!(c.classify(&ext), None);
    }

    #[test]
    fn test_partition_roles() {
        assert_eq!(Classification::StaticAsset.partition_role(), PartitionRole::Static);
        assert_eq!(Classification::ThirdPartyAsset.partition_role(), PartitionRole::Dynamic);
        assert_eq!(Classification::UpstreamApi.partition_role(), PartitionRole::Dynamic);
        assert_eq!(Classification::Other.partition_role(), PartitionRole::Dynamic);
    }
}
