//! URL slugs for catalog entries.

/// Turn a product name into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters becomes a single hyphen. Leading and trailing hyphens are
/// dropped.
///
/// ```
/// use shopfront_core::slugify;
///
/// assert_eq!(slugify("Organic Cotton T-Shirt (XL)"), "organic-cotton-t-shirt-xl");
/// assert_eq!(slugify("  --Café  Latte-- "), "caf-latte");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_separators() {
        assert_eq!(slugify("Red   Wool__Scarf"), "red-wool-scarf");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_digits_kept() {
        assert_eq!(slugify("Mug 2.0"), "mug-2-0");
    }
}
