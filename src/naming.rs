//! Type and field naming
//!
//! Output keys and relationship field names are derived from type and
//! relation names through an [`Inflector`]. Implementations must be pure:
//! the same input always yields the same output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pluralization and camel-casing used to derive keys.
pub trait Inflector: Send + Sync {
    /// Plural form of `word`, preserving the case of its first letter.
    fn pluralize(&self, word: &str) -> String;

    /// Lower camel case form of `word` (`book_review` -> `bookReview`).
    fn camelize(&self, word: &str) -> String;

    /// Key of the output collection holding records of `type_name`.
    fn collection_key(&self, type_name: &str) -> String {
        self.camelize(&self.pluralize(type_name))
    }

    /// Name of the array field backing a has-many relation.
    fn has_many_field(&self, relation: &str) -> String {
        self.camelize(&self.pluralize(relation))
    }

    /// Name of the foreign key field backing a belongs-to relation.
    fn foreign_key_field(&self, relation: &str, suffix: &str) -> String {
        format!("{}{}", self.camelize(relation), suffix)
    }
}

// Ordered by priority, first match wins.
static PLURAL_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)(quiz)$", "${1}zes"),
        (r"(?i)^(oxen)$", "${1}"),
        (r"(?i)^(ox)$", "${1}en"),
        (r"(?i)^([ml])ice$", "${1}ice"),
        (r"(?i)^([ml])ouse$", "${1}ice"),
        (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
        (r"(?i)(x|ch|ss|sh)$", "${1}es"),
        (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
        (r"(?i)(hive)$", "${1}s"),
        (r"(?i)([^f])fe$", "${1}ves"),
        (r"(?i)([lr])f$", "${1}ves"),
        (r"(?i)sis$", "ses"),
        (r"(?i)([ti])a$", "${1}a"),
        (r"(?i)([ti])um$", "${1}a"),
        (r"(?i)(buffal|tomat|potat)o$", "${1}oes"),
        (r"(?i)(bu)s$", "${1}ses"),
        (r"(?i)(alias|status)$", "${1}es"),
        (r"(?i)(octop|vir)i$", "${1}i"),
        (r"(?i)(octop|vir)us$", "${1}i"),
        (r"(?i)^(ax|test)is$", "${1}es"),
        (r"(?i)s$", "s"),
        (r"$", "s"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (Regex::new(pattern).expect("plural rule is a valid regex"), replacement)
    })
    .collect()
});

static IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
    ("move", "moves"),
    ("sex", "sexes"),
];

static UNCOUNTABLES: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "people",
    "children",
];

/// Rule-based English inflector.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishInflector;

impl EnglishInflector {
    pub fn new() -> Self {
        EnglishInflector
    }

    fn pluralize_word(word: &str) -> String {
        let lower = word.to_lowercase();

        if UNCOUNTABLES.contains(&lower.as_str()) {
            return word.to_string();
        }

        if let Some((_, plural)) = IRREGULARS.iter().find(|(singular, _)| *singular == lower) {
            return match_initial_case(word, plural);
        }

        for (rule, replacement) in PLURAL_RULES.iter() {
            if rule.is_match(word) {
                return rule.replace(word, *replacement).into_owned();
            }
        }

        word.to_string()
    }
}

impl Inflector for EnglishInflector {
    fn pluralize(&self, word: &str) -> String {
        if word.is_empty() {
            return String::new();
        }
        let start = last_word_start(word);
        let (head, tail) = word.split_at(start);
        format!("{}{}", head, Self::pluralize_word(tail))
    }

    fn camelize(&self, word: &str) -> String {
        let mut out = String::with_capacity(word.len());
        let mut upper_next = false;

        for ch in word.chars() {
            if matches!(ch, '_' | '-' | ' ') {
                upper_next = !out.is_empty();
                continue;
            }
            if out.is_empty() {
                out.extend(ch.to_lowercase());
            } else if upper_next {
                out.extend(ch.to_uppercase());
            } else {
                out.push(ch);
            }
            upper_next = false;
        }

        out
    }
}

/// Byte offset where the last word of a camel, snake or kebab cased
/// identifier begins.
fn last_word_start(word: &str) -> usize {
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (idx, ch) in word.char_indices() {
        match prev {
            Some(p) if matches!(p, '_' | '-' | ' ') => start = idx,
            Some(p) if ch.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()) => start = idx,
            _ => {}
        }
        prev = Some(ch);
    }

    start
}

fn match_initial_case(original: &str, replacement: &str) -> String {
    let initial_upper = original.chars().next().is_some_and(char::is_uppercase);
    if !initial_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_regular_words() {
        let inflector = EnglishInflector::new();
        assert_eq!(inflector.pluralize("Book"), "Books");
        assert_eq!(inflector.pluralize("tag"), "tags");
        assert_eq!(inflector.pluralize("Category"), "Categories");
        assert_eq!(inflector.pluralize("Box"), "Boxes");
        assert_eq!(inflector.pluralize("status"), "statuses");
        assert_eq!(inflector.pluralize("wife"), "wives");
    }

    #[test]
    fn test_pluralize_irregular_and_uncountable() {
        let inflector = EnglishInflector::new();
        assert_eq!(inflector.pluralize("Person"), "People");
        assert_eq!(inflector.pluralize("child"), "children");
        assert_eq!(inflector.pluralize("Sheep"), "Sheep");
        assert_eq!(inflector.pluralize("people"), "people");
    }

    #[test]
    fn test_pluralize_only_last_word() {
        let inflector = EnglishInflector::new();
        assert_eq!(inflector.pluralize("SalesPerson"), "SalesPeople");
        assert_eq!(inflector.pluralize("book_category"), "book_categories");
        assert_eq!(inflector.pluralize("BookReview"), "BookReviews");
    }

    #[test]
    fn test_camelize() {
        let inflector = EnglishInflector::new();
        assert_eq!(inflector.camelize("Books"), "books");
        assert_eq!(inflector.camelize("book_reviews"), "bookReviews");
        assert_eq!(inflector.camelize("BookReviews"), "bookReviews");
        assert_eq!(inflector.camelize("co-author"), "coAuthor");
        assert_eq!(inflector.camelize("_private"), "private");
    }

    #[test]
    fn test_derived_keys() {
        let inflector = EnglishInflector::new();
        assert_eq!(inflector.collection_key("Person"), "people");
        assert_eq!(inflector.collection_key("BookReview"), "bookReviews");
        assert_eq!(inflector.has_many_field("tag"), "tags");
        assert_eq!(inflector.foreign_key_field("co_author", "Id"), "coAuthorId");
    }
}
