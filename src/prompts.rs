//! Extraction prompt and the text budget applied before it.
//!
//! The prompt is fixed: it names the exact JSON shape the normaliser in
//! [`crate::pipeline::normalize`] expects, and it is the same regardless of
//! which UI language the user selected (labels are multilingual anyway).

/// Marker inserted where the middle of an over-long label text was cut.
pub const TRUNCATION_MARKER: &str = "\n\n[... middle content truncated ...]\n\n";

/// Extraction prompt. `{text}` is replaced with the (truncated) label text.
pub const EXTRACTION_PROMPT: &str = r#"
You are a multilingual food label analyzer. Extract allergen and nutritional data from this text.
Return JSON like:
{
  "allergens": {
    "gluten": true/false,
    "egg": true/false,
    "crustaceans": true/false,
    "fish": true/false,
    "peanut": true/false,
    "soy": true/false,
    "milk": true/false,
    "tree_nuts": true/false,
    "celery": true/false,
    "mustard": true/false
  },
  "nutritional_values": {
    "energy": "...",
    "fat": "...",
    "carbohydrate": "...",
    "sugar": "...",
    "protein": "...",
    "sodium": "..."
  }
}

Text:
{text}"#;

/// Prompt used by the connection self-test.
pub const CONNECTION_TEST_PROMPT: &str = "Say 'Hello, I am working!' in exactly those words.";

/// Build the extraction prompt around already-truncated label text.
pub fn extraction_prompt(text: &str) -> String {
    EXTRACTION_PROMPT.replace("{text}", text)
}

/// Keep the head and tail of `text` when it exceeds `budget` characters.
///
/// Counts Unicode scalar values, not bytes, so multi-byte labels (Hungarian,
/// Bulgarian) are never split inside a character. The result is
/// `budget/2` head chars, [`TRUNCATION_MARKER`], `budget/2` tail chars.
pub fn truncate_middle(text: &str, budget: usize) -> String {
    let len = text.chars().count();
    if len <= budget {
        return text.to_string();
    }

    let mid = budget / 2;
    let head_end = text
        .char_indices()
        .nth(mid)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let tail_start = text
        .char_indices()
        .nth(len - mid)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let mut out = String::with_capacity(head_end + TRUNCATION_MARKER.len() + text.len() - tail_start);
    out.push_str(&text[..head_end]);
    out.push_str(TRUNCATION_MARKER);
    out.push_str(&text[tail_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_key() {
        let p = extraction_prompt("Zutaten: Milch");
        for key in [
            "gluten", "egg", "crustaceans", "fish", "peanut", "soy", "milk", "tree_nuts",
            "celery", "mustard", "energy", "fat", "carbohydrate", "sugar", "protein", "sodium",
        ] {
            assert!(p.contains(&format!("\"{key}\"")), "missing {key}");
        }
        assert!(p.ends_with("Text:\nZutaten: Milch"));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_middle("abc", 10), "abc");
        assert_eq!(truncate_middle("abcdefghij", 10), "abcdefghij");
    }

    #[test]
    fn long_text_keeps_head_and_tail() {
        let text: String = ('a'..='z').cycle().take(10_000).collect();
        let out = truncate_middle(&text, 6000);
        assert_eq!(out.chars().count(), 6000 + TRUNCATION_MARKER.chars().count());
        assert!(out.starts_with(&text[..3000]));
        assert!(out.ends_with(&text[text.len() - 3000..]));
        assert!(out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ő".repeat(50);
        let out = truncate_middle(&text, 10);
        assert!(out.starts_with("őőőőő\n\n"));
        assert!(out.ends_with("\n\nőőőőő"));
    }
}
