use crate::hash::DhtHash;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque id under which a crawl profile is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileHandle(String);

impl ProfileHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        ProfileHandle(handle.into())
    }

    /// Handle derived from a profile name.
    pub fn for_name(name: &str) -> Self {
        ProfileHandle(DhtHash::of(name).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A regular expression that must match a whole URL (or content string).
///
/// `.*` matches everything and the empty pattern matches nothing, following
/// the convention of crawl profile filters.
#[derive(Clone)]
pub struct UrlPattern {
    source: String,
    regex: Option<Regex>,
}

impl UrlPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = if pattern.is_empty() || pattern == ".*" {
            None
        } else {
            Some(Regex::new(&format!("^(?:{pattern})$"))?)
        };
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn match_all() -> Self {
        Self {
            source: ".*".to_string(),
            regex: None,
        }
    }

    pub fn match_none() -> Self {
        Self {
            source: String::new(),
            regex: None,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => self.source == ".*",
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UrlPattern").field(&self.source).finish()
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for UrlPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for UrlPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        UrlPattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// Configuration of one crawl job: how deep to follow links, which URLs to
/// crawl and index, and what kind of content to index.
///
/// Profiles are immutable while a crawl runs; the pipeline only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlProfile {
    pub name: String,
    pub depth: u32,
    pub crawler_url_must_match: UrlPattern,
    pub crawler_url_must_not_match: UrlPattern,
    /// URLs matching this pattern are stacked regardless of depth
    pub crawler_no_depth_limit_match: UrlPattern,
    pub index_url_must_match: UrlPattern,
    pub index_url_must_not_match: UrlPattern,
    pub index_content_must_match: UrlPattern,
    pub index_content_must_not_match: UrlPattern,
    pub index_text: bool,
    pub index_media: bool,
    pub obey_html_robots_noindex: bool,
    pub obey_html_robots_nofollow: bool,
    pub remote_indexing: bool,
    pub collections: Vec<String>,
    /// Documents older than this are re-crawled; `None` disables recrawl
    pub recrawl_if_older_secs: Option<u64>,
}

impl CrawlProfile {
    pub fn new(name: impl Into<String>, depth: u32) -> Self {
        Self {
            name: name.into(),
            depth,
            crawler_url_must_match: UrlPattern::match_all(),
            crawler_url_must_not_match: UrlPattern::match_none(),
            crawler_no_depth_limit_match: UrlPattern::match_none(),
            index_url_must_match: UrlPattern::match_all(),
            index_url_must_not_match: UrlPattern::match_none(),
            index_content_must_match: UrlPattern::match_all(),
            index_content_must_not_match: UrlPattern::match_none(),
            index_text: true,
            index_media: true,
            obey_html_robots_noindex: true,
            obey_html_robots_nofollow: false,
            remote_indexing: false,
            collections: vec!["user".to_string()],
            recrawl_if_older_secs: None,
        }
    }

    pub fn handle(&self) -> ProfileHandle {
        ProfileHandle::for_name(&self.name)
    }

    /// Whether links to `url` found at `depth` may be pushed to the crawl frontier.
    pub fn accepts_for_crawl(&self, url: &str, depth: u32) -> bool {
        let within_depth = depth < self.depth || self.crawler_no_depth_limit_match.is_match(url);
        within_depth
            && self.crawler_url_must_match.is_match(url)
            && !self.crawler_url_must_not_match.is_match(url)
    }

    pub fn accepts_url_for_index(&self, url: &str) -> bool {
        self.index_url_must_match.is_match(url) && !self.index_url_must_not_match.is_match(url)
    }

    pub fn accepts_content_for_index(&self, text: &str) -> bool {
        self.index_content_must_match.is_match(text)
            && !self.index_content_must_not_match.is_match(text)
    }

    /// Neither text nor media indexing is enabled.
    pub fn indexes_nothing(&self) -> bool {
        !self.index_text && !self.index_media
    }
}

/// Registry of active crawl profiles, keyed by handle.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: DashMap<ProfileHandle, Arc<CrawlProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile, returning its handle.
    pub fn insert(&self, profile: CrawlProfile) -> ProfileHandle {
        let handle = profile.handle();
        self.profiles.insert(handle.clone(), Arc::new(profile));
        handle
    }

    pub fn get(&self, handle: &ProfileHandle) -> Option<Arc<CrawlProfile>> {
        self.profiles.get(handle).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, handle: &ProfileHandle) -> Option<Arc<CrawlProfile>> {
        self.profiles.remove(handle).map(|(_, profile)| profile)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_conventions() {
        assert!(UrlPattern::match_all().is_match("anything"));
        assert!(!UrlPattern::match_none().is_match("anything"));
        assert!(!UrlPattern::match_none().is_match(""));

        let pattern = UrlPattern::new(r"http://example\.test/.*").unwrap();
        assert!(pattern.is_match("http://example.test/a.html"));
        assert!(!pattern.is_match("see http://example.test/a.html"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(UrlPattern::new("(").is_err());
    }

    #[test]
    fn test_crawl_acceptance_depth() {
        let mut profile = CrawlProfile::new("depth", 1);
        assert!(profile.accepts_for_crawl("http://a.test/", 0));
        assert!(!profile.accepts_for_crawl("http://a.test/", 1));

        profile.crawler_no_depth_limit_match = UrlPattern::new(r"http://a\.test/.*").unwrap();
        assert!(profile.accepts_for_crawl("http://a.test/deep", 5));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProfileRegistry::new();
        let handle = registry.insert(CrawlProfile::new("news", 2));
        assert_eq!(handle, ProfileHandle::for_name("news"));
        assert_eq!(registry.get(&handle).map(|p| p.depth), Some(2));
        assert!(registry.get(&ProfileHandle::new("missing")).is_none());
    }
}
