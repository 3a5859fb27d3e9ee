//! Identifier case conversion and English pluralization.
//!
//! Words are split on `_`, `-`, spaces and dots, on lower→upper transitions
//! and at the end of an acronym (`HTTPServer` is `HTTP` + `Server`).

use std::ops::Range;

/// Words that have the same singular and plural form.
const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "information",
    "metadata",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
    "deer",
    "feedback",
    "rice",
    "money",
    "software",
    "staff",
];

/// Irregular (singular, plural) pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("quiz", "quizzes"),
    ("cache", "caches"),
    ("niche", "niches"),
    ("headache", "headaches"),
    ("avalanche", "avalanches"),
    ("moustache", "moustaches"),
    ("menu", "menus"),
    ("emu", "emus"),
];

/// (singular, plural) pairs for the -f/-fe → -ves rule.
const F_TO_VES: &[(&str, &str)] = &[
    ("knife", "knives"),
    ("life", "lives"),
    ("wife", "wives"),
    ("leaf", "leaves"),
    ("half", "halves"),
    ("wolf", "wolves"),
    ("shelf", "shelves"),
    ("loaf", "loaves"),
    ("thief", "thieves"),
    ("calf", "calves"),
    ("elf", "elves"),
];

/// Words ending in `ie` whose plural `ies` must not become `y`.
const IE_WORDS: &[&str] = &["movie", "cookie", "zombie", "pie", "tie", "rookie", "selfie"];

/// Consonant + o words that take `es`.
const O_TO_OES: &[&str] = &["hero", "potato", "tomato", "echo", "veto", "torpedo"];

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | ' ' | '.')
}

/// Returns the byte ranges of the words in `s`.
fn word_ranges(s: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &(pos, c)) in chars.iter().enumerate() {
        if is_separator(c) {
            if let Some(begin) = start.take() {
                ranges.push(begin..pos);
            }
            continue;
        }

        let Some(begin) = start else {
            start = Some(pos);
            continue;
        };

        let prev = chars[i - 1].1;
        let next = chars.get(i + 1).map(|&(_, n)| n);
        let boundary = c.is_uppercase()
            && (prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase())));

        if boundary {
            ranges.push(begin..pos);
            start = Some(pos);
        }
    }

    if let Some(begin) = start {
        ranges.push(begin..s.len());
    }
    ranges
}

/// Splits an identifier into its words.
pub fn split_words(s: &str) -> Vec<&str> {
    word_ranges(s).into_iter().map(|r| &s[r]).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// `OrderItem` → `order_item`.
pub fn to_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `order_item` → `OrderItem`.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// `order_item` → `orderItem`.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::new();
    for (i, word) in split_words(s).iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

/// `OrderItem` → `order-item`.
pub fn to_kebab_case(s: &str) -> String {
    to_snake_case(s).replace('_', "-")
}

/// `orderItem` → `ORDER_ITEM`.
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// Applies the casing of `original` to the lowercase word `word`.
fn match_case(original: &str, word: &str) -> String {
    let mut letters = original.chars().filter(|c| c.is_alphabetic());
    let first_upper = letters.next().is_some_and(|c| c.is_uppercase());
    let rest_upper = original.chars().filter(|c| c.is_alphabetic()).count() > 1
        && original
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());

    if rest_upper {
        word.to_uppercase()
    } else if first_upper {
        capitalize(word)
    } else {
        word.to_string()
    }
}

/// Rewrites the last word of `s` with `inflect`, keeping the prefix and casing.
fn inflect_last_word(s: &str, inflect: fn(&str) -> String) -> String {
    let Some(last) = word_ranges(s).pop() else {
        return s.to_string();
    };
    let word = &s[last.clone()];
    let inflected = inflect(&word.to_lowercase());
    format!("{}{}{}", &s[..last.start], match_case(word, &inflected), &s[last.end..])
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Returns true if the character before a trailing `suffix` is a consonant.
fn consonant_before(word: &str, suffix_len: usize) -> bool {
    word[..word.len() - suffix_len]
        .chars()
        .last()
        .is_some_and(|c| !is_vowel(c))
}

fn plural_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, p)| *s == word || *p == word) {
        return plural.to_string();
    }
    if let Some((_, plural)) = F_TO_VES.iter().find(|(s, p)| *s == word || *p == word) {
        return plural.to_string();
    }
    if word.ends_with('y') && word.len() > 1 && consonant_before(word, 1) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if word.ends_with("is") && word.len() > 2 {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    if O_TO_OES.contains(&word) {
        return format!("{word}es");
    }
    format!("{word}s")
}

fn singular_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(s, p)| *p == word || *s == word) {
        return singular.to_string();
    }
    if let Some((singular, _)) = F_TO_VES.iter().find(|(s, p)| *p == word || *s == word) {
        return singular.to_string();
    }
    if let Some(stem) = word.strip_suffix("oes") {
        if O_TO_OES.iter().any(|o| o.strip_suffix('o') == Some(stem)) {
            return format!("{stem}o");
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        if IE_WORDS.contains(&stem) {
            return stem.to_string();
        }
    }
    if word.len() > 3 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = word.strip_suffix("yses") {
        return format!("{stem}ysis");
    }
    for suffix in ["sses", "tuses", "buses", "ruses", "puses", "nuses", "xes", "zzes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if ["ss", "us", "is"].iter().any(|s| word.ends_with(s)) {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Returns the plural of the last word of `s`.
///
/// `category` → `categories`, `order_item` → `order_items`,
/// `Person` → `People`.
pub fn pluralize(s: &str) -> String {
    inflect_last_word(s, plural_word)
}

/// Returns the singular of the last word of `s`.
///
/// `categories` → `category`, `OrderItems` → `OrderItem`,
/// `statuses` → `status`.
pub fn singularize(s: &str) -> String {
    inflect_last_word(s, singular_word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("order_item"), vec!["order", "item"]);
        assert_eq!(split_words("OrderItem"), vec!["Order", "Item"]);
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("userID"), vec!["user", "ID"]);
        assert_eq!(split_words("address2_line"), vec!["address2", "line"]);
        assert_eq!(split_words("__x--y  z"), vec!["x", "y", "z"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("OrderItem"), "order_item");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("kebab-case-name"), "kebab_case_name");
    }

    #[test]
    fn test_pascal_and_camel_case() {
        assert_eq!(to_pascal_case("order_item"), "OrderItem");
        assert_eq!(to_pascal_case("user_id"), "UserId");
        assert_eq!(to_pascal_case("HTTPServer"), "HttpServer");
        assert_eq!(to_camel_case("order_item"), "orderItem");
        assert_eq!(to_camel_case("OrderItem"), "orderItem");
        assert_eq!(to_camel_case("id"), "id");
    }

    #[test]
    fn test_kebab_and_screaming() {
        assert_eq!(to_kebab_case("OrderItems"), "order-items");
        assert_eq!(to_screaming_snake_case("maxRetryCount"), "MAX_RETRY_COUNT");
    }

    #[test]
    fn test_pluralize_rules() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("analysis"), "analyses");
        assert_eq!(pluralize("knife"), "knives");
        assert_eq!(pluralize("hero"), "heroes");
        assert_eq!(pluralize("photo"), "photos");
    }

    #[test]
    fn test_pluralize_irregular_and_uncountable() {
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("news"), "news");
        assert_eq!(pluralize("metadata"), "metadata");
        assert_eq!(pluralize("people"), "people");
    }

    #[test]
    fn test_pluralize_keeps_compound_and_case() {
        assert_eq!(pluralize("order_item"), "order_items");
        assert_eq!(pluralize("OrderItem"), "OrderItems");
        assert_eq!(pluralize("Person"), "People");
        assert_eq!(pluralize("blog_category"), "blog_categories");
        assert_eq!(pluralize("USER"), "USERS");
    }

    #[test]
    fn test_singularize_rules() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("matches"), "match");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("buses"), "bus");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("analyses"), "analysis");
        assert_eq!(singularize("heroes"), "hero");
        assert_eq!(singularize("knives"), "knife");
        assert_eq!(singularize("wolves"), "wolf");
        assert_eq!(singularize("shelves"), "shelf");
        assert_eq!(singularize("leaves"), "leaf");
        assert_eq!(singularize("houses"), "house");
        assert_eq!(singularize("sizes"), "size");
        assert_eq!(singularize("movies"), "movie");
    }

    #[test]
    fn test_endings_that_look_like_suffixes() {
        assert_eq!(singularize("caches"), "cache");
        assert_eq!(singularize("quizzes"), "quiz");
        assert_eq!(singularize("menus"), "menu");
        assert_eq!(singularize("cpu_caches"), "cpu_cache");
        assert_eq!(pluralize("quiz"), "quizzes");
        assert_eq!(pluralize("menu"), "menus");
        assert_eq!(singularize("cache"), "cache");
        assert_eq!(singularize("menu"), "menu");
        assert_eq!(singularize("branches"), "branch");
    }

    #[test]
    fn test_singularize_is_idempotent_on_singulars() {
        assert_eq!(singularize("user"), "user");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("person"), "person");
        assert_eq!(singularize("news"), "news");
    }

    #[test]
    fn test_singularize_compound() {
        assert_eq!(singularize("order_items"), "order_item");
        assert_eq!(singularize("OrderItems"), "OrderItem");
        assert_eq!(singularize("post_tags"), "post_tag");
        assert_eq!(singularize("People"), "Person");
    }
}
