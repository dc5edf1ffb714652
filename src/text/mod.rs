//! Text filtering for alt and surrounding-text fields
//!
//! Image captions go through a fixed pipeline before being stored:
//! case/diacritic folding, stop-word stripping across the five languages the
//! crawler commonly encounters, whitespace collapsing, and a hard character
//! budget with whitespace-aware truncation.

/// Punctuation treated as token separators, in addition to whitespace
const SEPARATORS: &[char] = &[
    '.', ',', ':', ';', '!', '?', '#', '@', '[', ']', '{', '}', '|', '"', '&',
];

/// Common stop words in English, French, German, Spanish, and Italian
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "the", "and", "but", "or", "if", "while", "of", "at", "by", "for", "with", "about",
    "against", "between", "into", "through", "during", "before", "after", "above", "below", "to",
    "from", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once", "here",
    "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more", "most",
    "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very", "can", "will", "just", "don", "should", "now", "com",
    // French
    "je", "tu", "il", "elle", "nous", "vous", "ils", "elles", "le", "la", "les", "un", "une",
    "des", "fr",
    // German
    "der", "die", "das", "ein", "eine", "eines", "einem", "einen", "de",
    // Spanish
    "el", "los", "las", "unos", "unas", "es",
    // Italian
    "di", "che", "e", "per", "con", "su", "da", "del", "della", "dello", "dei", "degli", "delle",
    "al", "dal", "dalla", "dai", "dagli", "alle", "col", "sul", "sull", "sulla", "sullo", "sui",
    "sugli", "sulle", "nei", "negli", "nelle", "perche", "cosi", "quindi", "allora", "anche",
    "come", "dove", "quando", "chi", "non", "mai", "piu", "meno", "tuttavia", "ovunque",
    "altrove", "addirittura", "sempre", "gia", "appena", "proprio", "nient", "altro", "nulla",
    "qualcosa", "qualcuno", "tutt", "solamente", "it",
];

/// Folds one character to lowercase ASCII where a plain Latin equivalent
/// exists; other non-ASCII characters pass through lowercased.
fn fold_char(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' | 'À' | 'Á' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'a',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        'ý' | 'ÿ' | 'Ý' => 'y',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

/// Strips stop words from free text and collapses the remainder
///
/// Folds case and diacritics, splits on whitespace and the separator set,
/// drops stop-word tokens, and rejoins the survivors with single spaces.
pub fn remove_stop_words(input: &str) -> String {
    let folded: String = input.chars().map(fold_char).collect();
    let kept: Vec<&str> = folded
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|token| !token.is_empty() && !STOP_WORDS.contains(token))
        .collect();
    kept.join(" ")
}

/// Caps text at `budget` characters, preferring a whitespace boundary
///
/// If the text exceeds the budget, it is cut at the last whitespace at or
/// before the budget; with no whitespace in range it is cut hard at the
/// budget. Always returns trimmed text.
pub fn cap_length(input: &str, budget: usize) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= budget {
        return input.trim().to_string();
    }
    let scan_end = (budget + 1).min(chars.len());
    let cut = chars[..scan_end]
        .iter()
        .rposition(|c| c.is_whitespace())
        .unwrap_or(budget);
    chars[..cut].iter().collect::<String>().trim().to_string()
}

/// Full caption pipeline: stop-word filter, then length cap
pub fn filter_caption(input: &str, budget: usize) -> String {
    cap_length(&remove_stop_words(input), budget)
}
