use super::{dampen, CleanContext, PropertyType, TypeKind};
use once_cell::sync::Lazy;
use regex::Regex;

static E164: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("valid phone regex"));

/// Country calling codes used to complete national numbers.
const CALLING_CODES: &[(&str, &str)] = &[
    ("ae", "971"),
    ("ar", "54"),
    ("at", "43"),
    ("au", "61"),
    ("az", "994"),
    ("be", "32"),
    ("bg", "359"),
    ("br", "55"),
    ("by", "375"),
    ("ca", "1"),
    ("ch", "41"),
    ("cn", "86"),
    ("cy", "357"),
    ("cz", "420"),
    ("de", "49"),
    ("dk", "45"),
    ("ee", "372"),
    ("eg", "20"),
    ("es", "34"),
    ("fi", "358"),
    ("fr", "33"),
    ("gb", "44"),
    ("ge", "995"),
    ("gr", "30"),
    ("hr", "385"),
    ("hu", "36"),
    ("ie", "353"),
    ("il", "972"),
    ("in", "91"),
    ("it", "39"),
    ("jp", "81"),
    ("kz", "7"),
    ("lt", "370"),
    ("lu", "352"),
    ("lv", "371"),
    ("md", "373"),
    ("mt", "356"),
    ("mx", "52"),
    ("ng", "234"),
    ("nl", "31"),
    ("no", "47"),
    ("pa", "507"),
    ("pl", "48"),
    ("pt", "351"),
    ("ro", "40"),
    ("rs", "381"),
    ("ru", "7"),
    ("se", "46"),
    ("sg", "65"),
    ("si", "386"),
    ("sk", "421"),
    ("tr", "90"),
    ("ua", "380"),
    ("us", "1"),
    ("za", "27"),
];

fn calling_code(country: &str) -> Option<&'static str> {
    CALLING_CODES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, prefix)| *prefix)
}

/// Phone numbers in E.164 form.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneType;

impl PropertyType for PhoneType {
    fn kind(&self) -> TypeKind {
        TypeKind::Phone
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        32
    }

    fn clean(&self, raw: &str, context: &CleanContext) -> Option<String> {
        let raw = raw.trim();
        if raw
            .chars()
            .any(|c| !(c.is_ascii_digit() || " +-./()".contains(c)))
        {
            return None;
        }
        let international = raw.starts_with('+');
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        let number = if international {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            rest.to_string()
        } else {
            let prefix = context
                .countries
                .iter()
                .find_map(|country| calling_code(country))?;
            let national = digits.strip_prefix('0').unwrap_or(&digits);
            format!("{prefix}{national}")
        };

        let candidate = format!("+{number}");
        if E164.is_match(&candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    fn validate(&self, raw: &str) -> bool {
        E164.is_match(raw)
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(7, 11, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_international_numbers() {
        let ctx = CleanContext::default();
        assert_eq!(
            PhoneType.clean("+49 (30) 1234-5678", &ctx),
            Some("+493012345678".to_string())
        );
        assert_eq!(
            PhoneType.clean("0049 30 12345678", &ctx),
            Some("+493012345678".to_string())
        );
    }

    #[test]
    fn test_national_numbers_need_a_country() {
        let ctx = CleanContext::default();
        assert_eq!(PhoneType.clean("030 12345678", &ctx), None);

        let ctx = CleanContext::default().with_countries(vec!["de".to_string()]);
        assert_eq!(
            PhoneType.clean("030 12345678", &ctx),
            Some("+493012345678".to_string())
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        let ctx = CleanContext::default();
        assert_eq!(PhoneType.clean("call me maybe", &ctx), None);
        assert_eq!(PhoneType.clean("+12", &ctx), None);
        assert!(!PhoneType.validate("030 12345678"));
        assert!(PhoneType.validate("+493012345678"));
    }
}
