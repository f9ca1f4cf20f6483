use super::{dampen, CleanContext, PropertyType, TypeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(?:\.[^@\s.]+)+$").expect("valid email regex")
});

const URL_SCHEMES: &[&str] = &["http", "https", "ftp"];

/// E-mail addresses with a lowercased domain part.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailType;

impl PropertyType for EmailType {
    fn kind(&self) -> TypeKind {
        TypeKind::Email
    }

    fn pivot(&self) -> bool {
        true
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("mailto:").unwrap_or(raw);
        let raw = raw.trim_matches(|c| c == '<' || c == '>').trim();
        let (local, domain) = raw.rsplit_once('@')?;
        let domain = domain.trim_matches('.').to_lowercase();
        let candidate = format!("{local}@{domain}");
        if EMAIL.is_match(&candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    fn normalize_key(&self, value: &str) -> String {
        value.to_lowercase()
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(6, 30, value)
    }
}

/// Web addresses, normalized by the `url` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlType;

impl PropertyType for UrlType {
    fn kind(&self) -> TypeKind {
        TypeKind::Url
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        4096
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains(char::is_whitespace) {
            return None;
        }
        let mut parsed = if raw.contains("://") {
            Url::parse(raw).ok()?
        } else {
            Url::parse(&format!("http://{raw}")).ok()?
        };
        if !URL_SCHEMES.contains(&parsed.scheme()) || parsed.host_str().is_none() {
            return None;
        }
        parsed.set_fragment(None);
        Some(parsed.to_string())
    }

    fn normalize_key(&self, value: &str) -> String {
        self.clean(value, &CleanContext::default())
            .unwrap_or_else(|| value.to_string())
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(10, 120, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_cleaning() {
        let ctx = CleanContext::default();
        assert_eq!(
            EmailType.clean(" mailto:Jane.Doe@Example.ORG ", &ctx),
            Some("Jane.Doe@example.org".to_string())
        );
        assert_eq!(EmailType.clean("<info@acme.com>", &ctx), Some("info@acme.com".to_string()));
        assert_eq!(EmailType.clean("not an email", &ctx), None);
        assert_eq!(EmailType.clean("user@localhost", &ctx), None);
        assert_eq!(EmailType.compare("jane@example.org", "JANE@example.org"), 1.0);
    }

    #[test]
    fn test_url_cleaning() {
        let ctx = CleanContext::default();
        assert_eq!(
            UrlType.clean("Example.COM/path#section", &ctx),
            Some("http://example.com/path".to_string())
        );
        assert_eq!(
            UrlType.clean("https://example.com:443/", &ctx),
            Some("https://example.com/".to_string())
        );
        assert_eq!(UrlType.clean("mailto:someone@example.com", &ctx), None);
        assert_eq!(UrlType.clean("two words", &ctx), None);
    }

    #[test]
    fn test_url_compare_after_normalization() {
        assert_eq!(UrlType.compare("http://example.com/", "http://EXAMPLE.com/#top"), 1.0);
        assert_eq!(UrlType.compare("http://example.com/a", "http://example.com/b"), 0.0);
    }
}
