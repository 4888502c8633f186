use std::fmt;

use crate::core::TargetId;

/// URI schemes the loader knows how to fetch.
///
/// ```text
/// "http://site.com/image.png"      web
/// "https://site.com/image.png"     web
/// "file:///mnt/sdcard/image.png"   absolute path
/// "/mnt/sdcard/image.png"          bare path
/// "content://media/external/13"    content-provider reference
/// "asset://image.png"              in-app asset
/// "drawable://2130837504"          in-app drawable resource
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UriScheme {
    Net,
    File,
    Path,
    Content,
    Asset,
    Drawable,
}

const SCHEME_PREFIXES: &[(&str, UriScheme)] = &[
    ("http://", UriScheme::Net),
    ("https://", UriScheme::Net),
    ("file://", UriScheme::File),
    ("content://", UriScheme::Content),
    ("asset://", UriScheme::Asset),
    ("drawable://", UriScheme::Drawable),
    ("/", UriScheme::Path),
];

impl UriScheme {
    /// Recognize the scheme of `uri`, or `None` if it is not supported.
    pub fn of(uri: &str) -> Option<Self> {
        let uri = uri.trim();
        SCHEME_PREFIXES.iter().find_map(|(prefix, scheme)| {
            let matched = uri.len() > prefix.len()
                && uri.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes());
            matched.then_some(*scheme)
        })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, UriScheme::Net)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UriScheme::Net => "net",
            UriScheme::File => "file",
            UriScheme::Path => "path",
            UriScheme::Content => "content",
            UriScheme::Asset => "asset",
            UriScheme::Drawable => "drawable",
        }
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being requested and for whom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub uri: String,
    pub scheme: Option<UriScheme>,
    pub target: Option<TargetId>,
    pub name: String,
}

impl RequestDescriptor {
    /// The URI is stored trimmed; scheme recognition and disk lookups see the
    /// same string.
    pub fn new(uri: impl Into<String>, target: Option<TargetId>, name: impl Into<String>) -> Self {
        let uri = uri.into().trim().to_string();
        Self {
            scheme: UriScheme::of(&uri),
            uri,
            target,
            name: name.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.uri.is_empty()
    }

    pub fn is_display_bound(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_recognition() {
        assert_eq!(UriScheme::of("http://site.com/a.png"), Some(UriScheme::Net));
        assert_eq!(UriScheme::of("HTTPS://site.com/a.png"), Some(UriScheme::Net));
        assert_eq!(UriScheme::of("file:///mnt/sdcard/a.png"), Some(UriScheme::File));
        assert_eq!(UriScheme::of("/mnt/sdcard/a.png"), Some(UriScheme::Path));
        assert_eq!(
            UriScheme::of("content://media/external/audio/albumart/13"),
            Some(UriScheme::Content)
        );
        assert_eq!(UriScheme::of("asset://a.png"), Some(UriScheme::Asset));
        assert_eq!(UriScheme::of("drawable://2130837504"), Some(UriScheme::Drawable));
    }

    #[test]
    fn test_unsupported_schemes() {
        assert_eq!(UriScheme::of("ftp://site.com/a.png"), None);
        assert_eq!(UriScheme::of("a.png"), None);
        assert_eq!(UriScheme::of("http://"), None);
        assert_eq!(UriScheme::of("/"), None);
        assert_eq!(UriScheme::of(""), None);
    }

    #[test]
    fn test_descriptor_blank() {
        let descriptor = RequestDescriptor::new("   ", None, "blank");
        assert!(descriptor.is_blank());
        assert!(descriptor.scheme.is_none());
        assert!(!descriptor.is_display_bound());
    }

    #[test]
    fn test_descriptor_trims_uri() {
        let descriptor = RequestDescriptor::new("  http://site.com/a.png \n", None, "padded");
        assert_eq!(descriptor.uri, "http://site.com/a.png");
        assert_eq!(descriptor.scheme, Some(UriScheme::Net));
    }
}
