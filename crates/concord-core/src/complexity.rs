//! Complexity gate for the multi-perspective path
//!
//! A cheap, deterministic heuristic. Short questions never fan out; longer ones
//! do when they carry strategic vocabulary, or when the upstream intent tag is
//! strategic and the question is long enough to deserve several opinions.

/// Shorter queries always take the single-call path
pub const MIN_QUERY_CHARS: usize = 40;
pub const MIN_QUERY_WORDS: usize = 8;

/// Word count at which a strategic intent alone is enough
pub const STRATEGIC_INTENT_MIN_WORDS: usize = 15;

/// Whole-word signals, compared against tokens
const SIGNAL_WORDS: &[&str] = &[
    "hold",
    "holding",
    "compare",
    "compared",
    "comparing",
    "vs",
    "versus",
    "risk",
    "risks",
    "risky",
    "strategy",
    "strategic",
    "plan",
    "plans",
    "planning",
    "timing",
    "invest",
    "investing",
    "investment",
    "investments",
    "tradeoff",
    "tradeoffs",
    "portfolio",
    "outlook",
    "forecast",
    "upside",
    "downside",
];

/// Stems matched as token prefixes
const SIGNAL_STEMS: &[&str] = &["diversif"];

/// Consecutive-token signals; hyphenated forms split into the same tokens
const SIGNAL_PHRASES: &[&[&str]] = &[
    &["should", "i"],
    &["should", "we"],
    &["or", "sell"],
    &["sell", "now"],
    &["long", "term"],
    &["pros", "and", "cons"],
    &["trade", "off"],
    &["market", "conditions"],
    &["which", "is", "better"],
    &["worth", "it"],
];

const STRATEGIC_INTENTS: &[&str] = &[
    "strategy",
    "deep_analysis",
    "comparison",
    "investment",
    "planning",
];

/// Whether `query` deserves several independent perspectives.
///
/// `intent` is the upstream classifier's tag and may be empty.
pub fn is_complex_enough_for_multi(query: &str, intent: &str) -> bool {
    let query = query.trim();
    let word_count = query.split_whitespace().count();
    if query.chars().count() < MIN_QUERY_CHARS || word_count < MIN_QUERY_WORDS {
        return false;
    }

    let lower = query.to_lowercase();
    if has_strategic_signal(&lower) {
        return true;
    }

    let intent = intent.trim().to_lowercase();
    STRATEGIC_INTENTS.contains(&intent.as_str()) && word_count >= STRATEGIC_INTENT_MIN_WORDS
}

fn has_strategic_signal(lower: &str) -> bool {
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    tokens.iter().any(|t| {
        SIGNAL_WORDS.contains(t) || SIGNAL_STEMS.iter().any(|stem| t.starts_with(*stem))
    }) || SIGNAL_PHRASES
        .iter()
        .any(|phrase| tokens.windows(phrase.len()).any(|w| w == *phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_query_never_qualifies() {
        assert!(!is_complex_enough_for_multi("What's this worth?", "deep_analysis"));
        assert!(!is_complex_enough_for_multi("Should I sell?", "strategy"));
    }

    #[test]
    fn test_strategic_question_qualifies() {
        assert!(is_complex_enough_for_multi(
            "Should I hold my sealed box until Q4 or sell now given current market conditions?",
            "strategy"
        ));
    }

    #[test]
    fn test_signal_without_intent() {
        assert!(is_complex_enough_for_multi(
            "Compare the first edition print against the later reprint for resale",
            ""
        ));
        assert!(is_complex_enough_for_multi(
            "Is grading this card worth it given what raw copies sell for lately?",
            "general"
        ));
    }

    #[test]
    fn test_long_plain_query_needs_strategic_intent() {
        let query = "Tell me everything you can find about the history of this particular \
                     printing and the artist who drew the cover illustration";
        assert!(!is_complex_enough_for_multi(query, "lookup"));
        assert!(is_complex_enough_for_multi(query, "deep_analysis"));
        assert!(is_complex_enough_for_multi(query, " Planning "));
    }

    #[test]
    fn test_strategic_intent_needs_longer_query() {
        // Long enough for the base gate but under the intent threshold
        let query = "Tell me about the artist who drew this cover illustration";
        assert!(query.chars().count() >= MIN_QUERY_CHARS);
        assert!(!is_complex_enough_for_multi(query, "deep_analysis"));
    }

    #[test]
    fn test_many_chars_few_words() {
        assert!(!is_complex_enough_for_multi(
            "Compare supercalifragilistic-expialidocious-variants thoroughly",
            "comparison"
        ));
    }

    #[test]
    fn test_case_insensitive_signals() {
        assert!(is_complex_enough_for_multi(
            "WHAT IS THE LONG-TERM OUTLOOK FOR VINTAGE SEALED PRODUCT PRICES",
            ""
        ));
    }

    #[test]
    fn test_signals_do_not_fire_inside_other_words() {
        assert!(!is_complex_enough_for_multi(
            "Can you give me a detailed explanation of how the grading company scores centering on cards?",
            "general"
        ));
        assert!(!is_complex_enough_for_multi(
            "Who was the original cardholder listed on this vintage membership card from the club?",
            ""
        ));
        assert!(!is_complex_enough_for_multi(
            "Can you investigate who printed the asterisk variant of this promo card?",
            ""
        ));
    }

    #[test]
    fn test_signal_word_forms_and_stems() {
        assert!(is_complex_enough_for_multi(
            "I am thinking about diversifying into graded cards from sealed boxes",
            ""
        ));
        assert!(is_complex_enough_for_multi(
            "Is it risky to keep holding these cards through the next set release?",
            ""
        ));
        assert!(is_complex_enough_for_multi(
            "What is the trade-off between grading now and waiting for the next reprint?",
            ""
        ));
    }
}
