// Package helpers for the lightweight execute path — name-marker extraction
// and asset path derivation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a unit name declaration in an artifact payload, e.g.
/// `name = "MainView"` or `name: 'MainView'`.
static NAME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name\s*[:=]\s*['"]([^'"]+)['"]"#).expect("valid regex"));

/// Extract the declared unit name from a raw payload, without trusting any
/// execution side effects.
pub(crate) fn extract_unit_name(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?;
    NAME_MARKER
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Directory of `url`, with a trailing slash. The package's assets and
/// sub-loads resolve relative to this.
pub(crate) fn package_base(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[..=idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_unit_name() {
        assert_eq!(
            extract_unit_name(b"this.name = 'Application';"),
            Some("Application".to_string())
        );
        assert_eq!(
            extract_unit_name(b"let unit = { name: \"AdBanner\", width: 300 };"),
            Some("AdBanner".to_string())
        );
        assert_eq!(extract_unit_name(b"no marker here"), None);
        assert_eq!(extract_unit_name(&[0xff, 0xfe, 0x00]), None);
    }

    #[test]
    fn test_package_base() {
        assert_eq!(
            package_base("http://cdn.example.com/ads/banner.js"),
            "http://cdn.example.com/ads/"
        );
        assert_eq!(package_base("banner.js"), "");
    }
}
