use serde::{Deserialize, Serialize};

/// A hyperlink extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub url: String,
    pub text: String,
    pub nofollow: bool,
}

impl Anchor {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            nofollow: false,
        }
    }

    pub fn nofollow(mut self) -> Self {
        self.nofollow = true;
        self
    }
}

/// An embedded image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLink {
    pub url: String,
    pub alt: String,
}

/// Coarse content class derived from a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentDomain {
    Text,
    Image,
    Audio,
    Video,
    Application,
}

const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "ico", "webp", "svg", "mp3", "ogg", "wav",
    "flac", "aac", "m4a", "mp4", "avi", "mov", "mkv", "webm", "wmv", "flv", "mpg", "mpeg",
];

impl ContentDomain {
    pub fn from_mime(mime: &str) -> Self {
        let major = mime.split('/').next().unwrap_or("").trim().to_ascii_lowercase();
        match major.as_str() {
            "text" => ContentDomain::Text,
            "image" => ContentDomain::Image,
            "audio" => ContentDomain::Audio,
            "video" => ContentDomain::Video,
            _ => ContentDomain::Application,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ContentDomain::Image | ContentDomain::Audio | ContentDomain::Video
        )
    }

    /// Whether the URL path ends in a known image, audio or video extension.
    pub fn is_media_url(url: &str) -> bool {
        file_extension(url)
            .map(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Lower-cased file extension of the URL path, without query or fragment.
pub fn file_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
        .unwrap_or(path);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// One parsed document. A single response can yield several (archives,
/// feeds), which is why the pipeline carries a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub mime_type: String,
    pub title: String,
    pub text: String,
    pub anchors: Vec<Anchor>,
    pub images: Vec<ImageLink>,
    /// Set when the document asks not to be indexed (robots noindex)
    pub indexing_denied: bool,
}

impl Document {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            title: String::new(),
            text: text.into(),
            anchors: Vec::new(),
            images: Vec::new(),
            indexing_denied: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    pub fn denied(mut self) -> Self {
        self.indexing_denied = true;
        self
    }

    pub fn domain(&self) -> ContentDomain {
        ContentDomain::from_mime(&self.mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_detection() {
        assert!(ContentDomain::is_media_url("http://example.test/pic.JPG"));
        assert!(ContentDomain::is_media_url("http://example.test/a/song.mp3?x=1"));
        assert!(!ContentDomain::is_media_url("http://example.test/a.html"));
        assert!(!ContentDomain::is_media_url("http://example.test/"));
        assert!(!ContentDomain::is_media_url("http://example.jpg"));
        assert!(ContentDomain::from_mime("video/mp4").is_media());
        assert_eq!(ContentDomain::from_mime("text/html"), ContentDomain::Text);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("http://h.test/x/y.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(file_extension("http://h.test/x/y"), None);
        assert_eq!(file_extension("http://h.test/x.pdf#p2").as_deref(), Some("pdf"));
    }
}
