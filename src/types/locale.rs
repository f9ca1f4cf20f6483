//! Country and language lookups backed by a compact built-in table.

use super::{fold_text, CleanContext, PropertyType, TypeKind};
use hashbrown::HashMap;
use once_cell::sync::Lazy;

/// (alpha-2, alpha-3, English name)
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("ad", "and", "Andorra"),
    ("ae", "are", "United Arab Emirates"),
    ("af", "afg", "Afghanistan"),
    ("al", "alb", "Albania"),
    ("am", "arm", "Armenia"),
    ("ao", "ago", "Angola"),
    ("ar", "arg", "Argentina"),
    ("at", "aut", "Austria"),
    ("au", "aus", "Australia"),
    ("az", "aze", "Azerbaijan"),
    ("ba", "bih", "Bosnia and Herzegovina"),
    ("bd", "bgd", "Bangladesh"),
    ("be", "bel", "Belgium"),
    ("bg", "bgr", "Bulgaria"),
    ("bh", "bhr", "Bahrain"),
    ("bm", "bmu", "Bermuda"),
    ("bo", "bol", "Bolivia"),
    ("br", "bra", "Brazil"),
    ("bs", "bhs", "Bahamas"),
    ("by", "blr", "Belarus"),
    ("bz", "blz", "Belize"),
    ("ca", "can", "Canada"),
    ("ch", "che", "Switzerland"),
    ("cl", "chl", "Chile"),
    ("cn", "chn", "China"),
    ("co", "col", "Colombia"),
    ("cr", "cri", "Costa Rica"),
    ("cu", "cub", "Cuba"),
    ("cy", "cyp", "Cyprus"),
    ("cz", "cze", "Czechia"),
    ("de", "deu", "Germany"),
    ("dk", "dnk", "Denmark"),
    ("do", "dom", "Dominican Republic"),
    ("dz", "dza", "Algeria"),
    ("ec", "ecu", "Ecuador"),
    ("ee", "est", "Estonia"),
    ("eg", "egy", "Egypt"),
    ("es", "esp", "Spain"),
    ("et", "eth", "Ethiopia"),
    ("fi", "fin", "Finland"),
    ("fr", "fra", "France"),
    ("gb", "gbr", "United Kingdom"),
    ("ge", "geo", "Georgia"),
    ("gg", "ggy", "Guernsey"),
    ("gh", "gha", "Ghana"),
    ("gi", "gib", "Gibraltar"),
    ("gr", "grc", "Greece"),
    ("gt", "gtm", "Guatemala"),
    ("hk", "hkg", "Hong Kong"),
    ("hn", "hnd", "Honduras"),
    ("hr", "hrv", "Croatia"),
    ("hu", "hun", "Hungary"),
    ("id", "idn", "Indonesia"),
    ("ie", "irl", "Ireland"),
    ("il", "isr", "Israel"),
    ("im", "imn", "Isle of Man"),
    ("in", "ind", "India"),
    ("iq", "irq", "Iraq"),
    ("ir", "irn", "Iran"),
    ("is", "isl", "Iceland"),
    ("it", "ita", "Italy"),
    ("je", "jey", "Jersey"),
    ("jo", "jor", "Jordan"),
    ("jp", "jpn", "Japan"),
    ("ke", "ken", "Kenya"),
    ("kg", "kgz", "Kyrgyzstan"),
    ("kp", "prk", "North Korea"),
    ("kr", "kor", "South Korea"),
    ("kw", "kwt", "Kuwait"),
    ("ky", "cym", "Cayman Islands"),
    ("kz", "kaz", "Kazakhstan"),
    ("lb", "lbn", "Lebanon"),
    ("li", "lie", "Liechtenstein"),
    ("lt", "ltu", "Lithuania"),
    ("lu", "lux", "Luxembourg"),
    ("lv", "lva", "Latvia"),
    ("ly", "lby", "Libya"),
    ("ma", "mar", "Morocco"),
    ("mc", "mco", "Monaco"),
    ("md", "mda", "Moldova"),
    ("me", "mne", "Montenegro"),
    ("mk", "mkd", "North Macedonia"),
    ("mt", "mlt", "Malta"),
    ("mu", "mus", "Mauritius"),
    ("mx", "mex", "Mexico"),
    ("my", "mys", "Malaysia"),
    ("ng", "nga", "Nigeria"),
    ("nl", "nld", "Netherlands"),
    ("no", "nor", "Norway"),
    ("nz", "nzl", "New Zealand"),
    ("om", "omn", "Oman"),
    ("pa", "pan", "Panama"),
    ("pe", "per", "Peru"),
    ("ph", "phl", "Philippines"),
    ("pk", "pak", "Pakistan"),
    ("pl", "pol", "Poland"),
    ("pt", "prt", "Portugal"),
    ("py", "pry", "Paraguay"),
    ("qa", "qat", "Qatar"),
    ("ro", "rou", "Romania"),
    ("rs", "srb", "Serbia"),
    ("ru", "rus", "Russia"),
    ("sa", "sau", "Saudi Arabia"),
    ("sc", "syc", "Seychelles"),
    ("se", "swe", "Sweden"),
    ("sg", "sgp", "Singapore"),
    ("si", "svn", "Slovenia"),
    ("sk", "svk", "Slovakia"),
    ("sy", "syr", "Syria"),
    ("th", "tha", "Thailand"),
    ("tj", "tjk", "Tajikistan"),
    ("tm", "tkm", "Turkmenistan"),
    ("tn", "tun", "Tunisia"),
    ("tr", "tur", "Turkey"),
    ("tw", "twn", "Taiwan"),
    ("ua", "ukr", "Ukraine"),
    ("ug", "uga", "Uganda"),
    ("us", "usa", "United States"),
    ("uy", "ury", "Uruguay"),
    ("uz", "uzb", "Uzbekistan"),
    ("ve", "ven", "Venezuela"),
    ("vg", "vgb", "British Virgin Islands"),
    ("vn", "vnm", "Vietnam"),
    ("xk", "xkx", "Kosovo"),
    ("ye", "yem", "Yemen"),
    ("za", "zaf", "South Africa"),
    ("zw", "zwe", "Zimbabwe"),
];

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("uk", "gb"),
    ("great britain", "gb"),
    ("england", "gb"),
    ("united states of america", "us"),
    ("america", "us"),
    ("russian federation", "ru"),
    ("czech republic", "cz"),
    ("republic of korea", "kr"),
    ("holland", "nl"),
    ("the netherlands", "nl"),
    ("turkiye", "tr"),
    ("viet nam", "vn"),
];

/// (ISO 639-2 alpha-3, ISO 639-1 alpha-2, English name)
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("ara", "ar", "Arabic"),
    ("aze", "az", "Azerbaijani"),
    ("bul", "bg", "Bulgarian"),
    ("ces", "cs", "Czech"),
    ("dan", "da", "Danish"),
    ("deu", "de", "German"),
    ("ell", "el", "Greek"),
    ("eng", "en", "English"),
    ("est", "et", "Estonian"),
    ("fas", "fa", "Persian"),
    ("fin", "fi", "Finnish"),
    ("fra", "fr", "French"),
    ("heb", "he", "Hebrew"),
    ("hin", "hi", "Hindi"),
    ("hrv", "hr", "Croatian"),
    ("hun", "hu", "Hungarian"),
    ("hye", "hy", "Armenian"),
    ("ita", "it", "Italian"),
    ("jpn", "ja", "Japanese"),
    ("kat", "ka", "Georgian"),
    ("kaz", "kk", "Kazakh"),
    ("kor", "ko", "Korean"),
    ("lav", "lv", "Latvian"),
    ("lit", "lt", "Lithuanian"),
    ("nld", "nl", "Dutch"),
    ("nor", "no", "Norwegian"),
    ("pol", "pl", "Polish"),
    ("por", "pt", "Portuguese"),
    ("ron", "ro", "Romanian"),
    ("rus", "ru", "Russian"),
    ("slk", "sk", "Slovak"),
    ("slv", "sl", "Slovenian"),
    ("spa", "es", "Spanish"),
    ("sqi", "sq", "Albanian"),
    ("srp", "sr", "Serbian"),
    ("swe", "sv", "Swedish"),
    ("tur", "tr", "Turkish"),
    ("ukr", "uk", "Ukrainian"),
    ("urd", "ur", "Urdu"),
    ("zho", "zh", "Chinese"),
];

static COUNTRY_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut lookup = HashMap::new();
    for (alpha2, alpha3, name) in COUNTRIES {
        lookup.insert(alpha2.to_string(), *alpha2);
        lookup.insert(alpha3.to_string(), *alpha2);
        lookup.insert(fold_text(name), *alpha2);
    }
    for (alias, alpha2) in COUNTRY_ALIASES {
        lookup.insert(alias.to_string(), *alpha2);
    }
    lookup
});

static LANGUAGE_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut lookup = HashMap::new();
    for (alpha3, alpha2, name) in LANGUAGES {
        lookup.insert(alpha3.to_string(), *alpha3);
        lookup.insert(alpha2.to_string(), *alpha3);
        lookup.insert(fold_text(name), *alpha3);
    }
    lookup
});

/// English name of a cleaned country code.
pub fn country_name(code: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(alpha2, _, _)| *alpha2 == code)
        .map(|(_, _, name)| *name)
}

/// Countries and territories as lowercase ISO 3166-1 alpha-2 codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryType;

impl PropertyType for CountryType {
    fn kind(&self) -> TypeKind {
        TypeKind::Country
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        16
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        COUNTRY_LOOKUP
            .get(fold_text(raw).as_str())
            .map(|code| code.to_string())
    }

    fn specificity(&self, _value: &str) -> f64 {
        0.1
    }
}

/// Languages as ISO 639-2 alpha-3 codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageType;

impl PropertyType for LanguageType {
    fn kind(&self) -> TypeKind {
        TypeKind::Language
    }

    fn matchable(&self) -> bool {
        false
    }

    fn max_length(&self) -> usize {
        16
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        LANGUAGE_LOOKUP
            .get(fold_text(raw).as_str())
            .map(|code| code.to_string())
    }
}
