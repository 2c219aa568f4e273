//! # SKU Derivation
//!
//! Products created without a SKU get one derived from their name:
//!
//! ```text
//! "Hot Dog (double)"  ──►  "HOTDOGDO"  ──► taken? ──► "HOTDOGDO02", "HOTDOGDO03", ...
//! "Ёлка"              ──►  "ITEM"      (no ASCII alphanumerics)
//! ```
//!
//! The database owns the uniqueness check; this module only produces
//! candidates.

/// Length of the name-derived SKU stem.
pub const SKU_STEM_LEN: usize = 8;

/// Stem used when the name has no ASCII letters or digits.
pub const FALLBACK_STEM: &str = "ITEM";

/// Derives the SKU stem from a product name.
///
/// ## Example
/// ```rust
/// use kiosk_core::sku::sku_stem;
///
/// assert_eq!(sku_stem("Hot Dog (double)"), "HOTDOGDO");
/// assert_eq!(sku_stem("  "), "ITEM");
/// ```
pub fn sku_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(SKU_STEM_LEN)
        .collect();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Candidate SKUs for a stem: the stem itself, then `stem02`, `stem03`, ...
pub fn sku_candidates(stem: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(stem.to_string()).chain((2u32..).map(move |n| format!("{stem}{n:02}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem() {
        assert_eq!(sku_stem("Cola 0.5"), "COLA05");
        assert_eq!(sku_stem("Sparkling water 1.5L"), "SPARKLIN");
        assert_eq!(sku_stem("Ёлка"), "ITEM");
    }

    #[test]
    fn test_candidates() {
        let c: Vec<String> = sku_candidates("COLA").take(3).collect();
        assert_eq!(c, vec!["COLA", "COLA02", "COLA03"]);
        assert_eq!(sku_candidates("X").nth(99), Some("X100".to_string()));
    }
}
