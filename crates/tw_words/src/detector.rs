use std::sync::Arc;

use tw_types::{WordHit, MAX_WORD_LEN, MIN_WORD_LEN};

use crate::Dictionary;

/// Sliding-window longest-match recognizer.
///
/// Feed it every character of the stream in order; it reports at most one
/// [`WordHit`] per character — the longest dictionary word *ending* at that
/// character. Hits from nearby positions may overlap; deduplicating overlaps
/// for display is the consumer's business, not the detector's.
///
/// The detector holds no cursor of its own: the caller supplies the absolute
/// position of each character, which makes the same detector usable for the
/// live stream and for historical re-scans.
pub struct WordDetector {
    dictionary: Arc<Dictionary>,

    /// The last `MAX_WORD_LEN` characters pushed, oldest first.
    window: String,
}

impl WordDetector {
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            window: String::with_capacity(MAX_WORD_LEN + 1),
        }
    }

    /// Slide `ch` (the character at absolute index `position`) into the
    /// window and look for the longest word ending at it.
    pub fn push(&mut self, ch: char, position: u64) -> Option<WordHit> {
        debug_assert!(ch.is_ascii_lowercase(), "stream characters are a..=z");

        self.window.push(ch);
        if self.window.len() > MAX_WORD_LEN {
            self.window.remove(0);
        }

        let longest = self.window.len().min(MAX_WORD_LEN);
        for len in (MIN_WORD_LEN..=longest).rev() {
            let tail = &self.window[self.window.len() - len..];
            if self.dictionary.contains(tail) {
                return Some(WordHit {
                    start: position + 1 - len as u64,
                    len: len as u32,
                    word: tail.to_owned(),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(words: &[&str]) -> WordDetector {
        WordDetector::new(Arc::new(Dictionary::from_words(words)))
    }

    /// Push `text` starting at absolute position `start`, collecting hits.
    fn scan(detector: &mut WordDetector, text: &str, start: u64) -> Vec<WordHit> {
        text.chars()
            .enumerate()
            .filter_map(|(i, ch)| detector.push(ch, start + i as u64))
            .collect()
    }

    #[test]
    fn finds_a_word_mid_stream() {
        let mut detector = detector(&["cat"]);
        let hits = scan(&mut detector, "xcatx", 100);
        assert_eq!(
            hits,
            vec![WordHit {
                start: 101,
                len: 3,
                word: "cat".to_owned(),
            }]
        );
    }

    #[test]
    fn longest_match_wins_and_overlaps_are_reported() {
        let mut detector = detector(&["cat", "cats", "scat"]);
        let hits = scan(&mut detector, "scats", 0);
        // Position 3 ends both "scat" (4) and "cat" (3) and the longer one
        // wins, suppressing "cat" entirely; position 4 ends "cats", which
        // overlaps the "scat" hit.
        assert_eq!(
            hits,
            vec![
                WordHit {
                    start: 0,
                    len: 4,
                    word: "scat".to_owned(),
                },
                WordHit {
                    start: 1,
                    len: 4,
                    word: "cats".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn at_most_one_hit_per_character() {
        let mut detector = detector(&["aaa", "aaaa", "aaaaa"]);
        for i in 0..10_u64 {
            let hit = detector.push('a', i);
            if i >= 2 {
                // One hit per push once the window is long enough, always
                // the longest match ending there.
                let hit = hit.unwrap();
                assert_eq!(hit.len as u64, (i + 1).min(5));
            } else {
                assert!(hit.is_none());
            }
        }
    }

    #[test]
    fn window_is_bounded() {
        let mut detector = detector(&["abcdefghijkl"]); // len 12 == MAX_WORD_LEN
        let hits = scan(&mut detector, "xxxxabcdefghijkl", 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start, 4);
        assert_eq!(hits[0].len, 12);

        // A match can never start before the window: "l" then the word again
        // only matches at the word's own position.
        let hits = scan(&mut detector, "abcdefghijkl", 16);
        assert_eq!(hits, vec![WordHit {
            start: 16,
            len: 12,
            word: "abcdefghijkl".to_owned(),
        }]);
    }

    #[test]
    fn too_short_words_never_match() {
        // Two-letter entries are dropped on dictionary load, so even a
        // stream full of them yields nothing.
        let mut detector = detector(&["at", "it"]);
        assert!(scan(&mut detector, "atatitat", 0).is_empty());
    }

    #[test]
    fn word_detected_across_restarts_of_position_space() {
        // The detector only cares about the positions the caller supplies.
        let mut detector = detector(&["dog"]);
        let hits = scan(&mut detector, "adogb", u64::MAX - 10);
        assert_eq!(hits[0].start, u64::MAX - 10 + 1);
    }
}
