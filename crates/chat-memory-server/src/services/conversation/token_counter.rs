use unicode_segmentation::UnicodeSegmentation;

pub struct TokenCounter;

impl TokenCounter {
    /// Rough estimate: avg 2.5 graphemes per token, rounded up.
    pub fn count_text(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let grapheme_count = text.graphemes(true).count();
        ((grapheme_count * 2 + 4) / 5).max(1)
    }

    pub fn count_turns(turns: &[String]) -> usize {
        turns.iter()
            .map(|turn| Self::count_text(turn))
            .sum()
    }
}
