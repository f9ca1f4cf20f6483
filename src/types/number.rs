use super::{CleanContext, PropertyType, TypeKind};

/// Numeric amounts kept as their cleaned decimal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberType;

impl NumberType {
    /// Parse a cleaned number.
    pub fn to_number(value: &str) -> Option<f64> {
        value.parse::<f64>().ok().filter(|number| number.is_finite())
    }
}

impl PropertyType for NumberType {
    fn kind(&self) -> TypeKind {
        TypeKind::Number
    }

    fn matchable(&self) -> bool {
        false
    }

    fn max_length(&self) -> usize {
        64
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '\'')
            .collect();
        if compact.is_empty() {
            return None;
        }
        // "1,234.50" and "1.234,50" both mean 1234.5; a lone comma is decimal.
        let normalized = match (compact.rfind(','), compact.rfind('.')) {
            (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => compact.replace(',', ""),
            (Some(comma), None) if compact.matches(',').count() == 1 && compact.len() - comma != 4 => {
                compact.replace(',', ".")
            }
            (Some(_), None) => compact.replace(',', ""),
            _ => compact,
        };
        Self::to_number(&normalized)?;
        Some(normalized)
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        match (Self::to_number(left), Self::to_number(right)) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(a), Some(b)) => {
                let scale = a.abs().max(b.abs());
                1.0 - (a - b).abs() / scale
            }
            _ => 0.0,
        }
    }
}
