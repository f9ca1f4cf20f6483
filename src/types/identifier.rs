use super::{collapse_spaces, dampen, sanitize_text, CleanContext, PropertyType, TypeKind};

fn alphanumeric_upper(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Registration numbers, passport numbers and similar codes.
///
/// Two identifiers match when they agree after dropping punctuation, spacing
/// and case.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierType;

impl PropertyType for IdentifierType {
    fn kind(&self) -> TypeKind {
        TypeKind::Identifier
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        64
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let text = collapse_spaces(&sanitize_text(raw)?);
        if alphanumeric_upper(&text).is_empty() || text.chars().count() > self.max_length() {
            return None;
        }
        Some(text)
    }

    fn normalize_key(&self, value: &str) -> String {
        alphanumeric_upper(value)
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(4, 10, &self.normalize_key(value))
    }
}

/// International bank account numbers, verified with the ISO 7064 mod-97 check.
#[derive(Debug, Clone, Copy, Default)]
pub struct IbanType;

impl IbanType {
    fn checksum_ok(iban: &str) -> bool {
        if !(15..=34).contains(&iban.len()) {
            return false;
        }
        let bytes = iban.as_bytes();
        if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit)
        {
            return false;
        }
        let rearranged = iban[4..].chars().chain(iban[..4].chars());
        let mut remainder: u32 = 0;
        for c in rearranged {
            let digit = match c.to_digit(36) {
                Some(digit) => digit,
                None => return false,
            };
            remainder = if digit >= 10 {
                (remainder * 100 + digit) % 97
            } else {
                (remainder * 10 + digit) % 97
            };
        }
        remainder == 1
    }
}

impl PropertyType for IbanType {
    fn kind(&self) -> TypeKind {
        TypeKind::Iban
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        64
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let iban = alphanumeric_upper(raw);
        if Self::checksum_ok(&iban) {
            Some(iban)
        } else {
            None
        }
    }

    fn specificity(&self, _value: &str) -> f64 {
        1.0
    }
}

/// SHA1 content hashes as 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumType;

impl PropertyType for ChecksumType {
    fn kind(&self) -> TypeKind {
        TypeKind::Checksum
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        40
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let value = raw.trim().to_ascii_lowercase();
        if value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(value)
        } else {
            None
        }
    }

    fn specificity(&self, _value: &str) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_normalization() {
        let ctx = CleanContext::default();
        assert_eq!(
            IdentifierType.clean("  HRB   12345 ", &ctx),
            Some("HRB 12345".to_string())
        );
        assert_eq!(IdentifierType.clean(" -/- ", &ctx), None);
        assert_eq!(IdentifierType.compare("HRB 12345", "hrb-12345"), 1.0);
        assert_eq!(IdentifierType.compare("HRB 12345", "HRB 12346"), 0.0);
    }

    #[test]
    fn test_identifier_specificity_grows_with_length() {
        assert_eq!(IdentifierType.specificity("A1"), 0.0);
        assert!(IdentifierType.specificity("X1234567") > IdentifierType.specificity("X12345"));
        assert_eq!(IdentifierType.specificity("X123456789"), 1.0);
    }

    #[test]
    fn test_iban_checksum() {
        let ctx = CleanContext::default();
        assert_eq!(
            IbanType.clean("de89 3704 0044 0532 0130 00", &ctx),
            Some("DE89370400440532013000".to_string())
        );
        assert_eq!(
            IbanType.clean("GB82 WEST 1234 5698 7654 32", &ctx),
            Some("GB82WEST12345698765432".to_string())
        );
        assert_eq!(IbanType.clean("DE89370400440532013001", &ctx), None);
        assert_eq!(IbanType.clean("DE89", &ctx), None);
    }

    #[test]
    fn test_checksum_hex() {
        let ctx = CleanContext::default();
        let sha1 = "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709";
        assert_eq!(ChecksumType.clean(sha1, &ctx), Some(sha1.to_lowercase()));
        assert_eq!(ChecksumType.clean("abc123", &ctx), None);
    }
}
