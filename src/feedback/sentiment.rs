//! Lexicon-based polarity scoring
//!
//! Each known word carries a polarity in [-1, 1]. An intensifier directly
//! before a word scales it; a negation within the two preceding tokens
//! flips and dampens it. The comment's polarity is the mean over scored
//! words, so a comment with no known words is neutral.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const POSITIVE_THRESHOLD: f64 = 0.1;
const NEGATIVE_THRESHOLD: f64 = -0.1;
const NEGATION_FACTOR: f64 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if polarity < NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("amazing", 0.6),
        ("awesome", 1.0),
        ("best", 1.0),
        ("clean", 0.37),
        ("delicious", 1.0),
        ("excellent", 1.0),
        ("fantastic", 0.4),
        ("fast", 0.2),
        ("favorite", 0.5),
        ("fresh", 0.3),
        ("friendly", 0.38),
        ("generous", 0.4),
        ("good", 0.7),
        ("great", 0.8),
        ("happy", 0.8),
        ("helpful", 0.5),
        ("hot", 0.25),
        ("love", 0.5),
        ("loved", 0.7),
        ("nice", 0.6),
        ("perfect", 1.0),
        ("polite", 0.5),
        ("quick", 0.33),
        ("recommend", 0.4),
        ("satisfied", 0.5),
        ("tasty", 0.7),
        ("wonderful", 1.0),
        ("yummy", 0.8),
        ("affordable", 0.3),
        ("bad", -0.7),
        ("bland", -0.5),
        ("burnt", -0.6),
        ("cold", -0.4),
        ("dirty", -0.6),
        ("disappointed", -0.75),
        ("disappointing", -0.6),
        ("disgusting", -1.0),
        ("expensive", -0.5),
        ("horrible", -1.0),
        ("late", -0.3),
        ("mediocre", -0.4),
        ("overpriced", -0.6),
        ("poor", -0.4),
        ("rude", -0.6),
        ("salty", -0.3),
        ("slow", -0.3),
        ("stale", -0.5),
        ("terrible", -1.0),
        ("unfriendly", -0.5),
        ("wrong", -0.5),
        ("worst", -1.0),
        ("hate", -0.8),
    ]
    .into_iter()
    .collect()
});

static INTENSIFIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("very", 1.3),
        ("really", 1.3),
        ("so", 1.3),
        ("super", 1.5),
        ("extremely", 1.5),
        ("incredibly", 1.5),
        ("quite", 1.1),
        ("too", 1.2),
        ("slightly", 0.6),
        ("somewhat", 0.7),
        ("bit", 0.7),
    ]
    .into_iter()
    .collect()
});

fn is_negation(token: &str) -> bool {
    matches!(
        token,
        "not" | "no" | "never" | "neither" | "nor" | "hardly" | "isn't" | "wasn't" | "aren't"
            | "weren't" | "don't" | "doesn't" | "didn't" | "can't" | "couldn't" | "won't"
            | "wouldn't" | "cannot"
    ) || token.ends_with("n't")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|token| !token.is_empty())
        .map(|token| token.trim_matches('\'').to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Polarity in [-1, 1]
pub fn polarity(text: &str) -> f64 {
    let tokens = tokenize(text);
    let mut total = 0.0;
    let mut scored = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        let Some(&base) = LEXICON.get(token.as_str()) else {
            continue;
        };
        let mut score = base;

        if index > 0 {
            if let Some(&factor) = INTENSIFIERS.get(tokens[index - 1].as_str()) {
                score *= factor;
            }
        }
        let window = index.saturating_sub(2)..index;
        if tokens[window].iter().any(|t| is_negation(t)) {
            score *= NEGATION_FACTOR;
        }

        total += score.clamp(-1.0, 1.0);
        scored += 1;
    }

    if scored == 0 {
        0.0
    } else {
        (total / scored as f64).clamp(-1.0, 1.0)
    }
}

/// Label and polarity for a comment
pub fn analyze(text: &str) -> (SentimentLabel, f64) {
    let score = polarity(text);
    (SentimentLabel::from_polarity(score), score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_positive_and_negative_comments() {
        assert_eq!(
            analyze("The adobo was delicious and the staff were friendly").0,
            SentimentLabel::Positive
        );
        assert_eq!(
            analyze("Food arrived cold and the rice was bland").0,
            SentimentLabel::Negative
        );
        assert_eq!(analyze("I ordered the sinigang").0, SentimentLabel::Neutral);
    }

    #[test]
    fn test_negation_flips_polarity() {
        assert!(polarity("the soup was good") > 0.1);
        assert!(polarity("the soup was not good") < -0.1);
        assert!(polarity("the service wasn't slow") > 0.0);
    }

    #[test]
    fn test_intensifier_strengthens() {
        assert!(polarity("very good") > polarity("good"));
        assert!(polarity("slightly bad") > polarity("bad"));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert_eq!(SentimentLabel::from_polarity(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(-0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(0.11), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_polarity(-0.11), SentimentLabel::Negative);
    }

    proptest! {
        #[test]
        fn polarity_stays_in_range(text in ".{0,250}") {
            let score = polarity(&text);
            prop_assert!((-1.0..=1.0).contains(&score));
        }
    }
}
