//! Noisy "exact-ish" string matching shared by command recognition,
//! confirmation prompts and named-entry prompts.
//!
//! Similarity is the Ratcliff/Obershelp ratio: `2 * M / T`, where `T` is the
//! total length of both strings and `M` the number of characters in the
//! matching blocks found by recursively taking the longest common substring.

/// Best candidate for a transcript; `command` is `None` when no candidates exist
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub command: Option<String>,
    pub score: f64,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            command: None,
            score: 0.0,
        }
    }
}

/// Similarity in `[0, 1]`; two empty strings are identical
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_characters(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Sum of all matching block sizes
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Among equally long blocks the one starting earliest in `a` wins, then the
/// one starting earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // prev[k] = length of the common suffix ending at a[i-1], b[blo+k]
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];

    for i in alo..ahi {
        for k in 0..width {
            let j = blo + k;
            curr[k] = if a[i] == b[j] {
                let run = if k > 0 { prev[k - 1] } else { 0 } + 1;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
                run
            } else {
                0
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Highest-scoring candidate; ties keep the first candidate seen
pub fn best_match<'a, I>(transcript: &str, candidates: I) -> MatchResult
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best = MatchResult::none();
    for candidate in candidates {
        let score = similarity(transcript, candidate);
        if best.command.is_none() || score > best.score {
            best = MatchResult {
                command: Some(candidate.to_string()),
                score,
            };
        }
    }
    best
}

/// Fuzzy matcher with an acceptance threshold
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    strictness: f64,
}

impl FuzzyMatcher {
    pub fn new(strictness: f64) -> Self {
        Self {
            strictness: strictness.clamp(0.0, 1.0),
        }
    }

    pub fn strictness(&self) -> f64 {
        self.strictness
    }

    pub fn accepts(&self, result: &MatchResult) -> bool {
        result.command.is_some() && result.score >= self.strictness
    }

    /// Best candidate if it clears the threshold
    pub fn find<'a, I>(&self, transcript: &str, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let result = best_match(transcript, candidates);
        if self.accepts(&result) {
            result.command
        } else {
            log::debug!(
                "No match above {:.2} for '{}' (best: {:?} @ {:.2})",
                self.strictness,
                transcript,
                result.command,
                result.score
            );
            None
        }
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_and_disjoint() {
        assert!(approx(similarity("lock system", "lock system"), 1.0));
        assert!(approx(similarity("abc", "xyz"), 0.0));
        assert!(approx(similarity("", ""), 1.0));
        assert!(approx(similarity("abc", ""), 0.0));
    }

    #[test]
    fn test_known_ratios() {
        // "abcd" vs "bcde": block "bcd" -> 2*3/8
        assert!(approx(similarity("abcd", "bcde"), 0.75));
        // blocks "stem", "k s", "lo" -> 2*9/21
        assert!(approx(similarity("lok sistem", "lock system"), 18.0 / 21.0));
        // blocks "lo", "s", "e" -> 2*4/24
        assert!(approx(similarity("close browser", "lock system"), 8.0 / 24.0));
    }

    #[test]
    fn test_symmetric_for_simple_cases() {
        let pairs = [("confirm", "conform"), ("decline", "deline"), ("tokyo", "kyoto")];
        for (a, b) in pairs {
            assert!(approx(similarity(a, b), similarity(b, a)), "{} / {}", a, b);
        }
    }

    #[test]
    fn test_best_match_is_deterministic() {
        let catalog = ["lock system", "sleep system", "shutdown system"];
        let first = best_match("lok sistem", catalog);
        let second = best_match("lok sistem", catalog);
        assert_eq!(first, second);
        assert_eq!(first.command.as_deref(), Some("lock system"));
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let result = best_match("ab", ["ax", "bx"]);
        assert_eq!(result.command.as_deref(), Some("ax"));
        assert!(approx(result.score, 0.5));
    }

    #[test]
    fn test_empty_catalog() {
        let result = best_match("anything", std::iter::empty());
        assert_eq!(result, MatchResult::none());
        assert!(!FuzzyMatcher::new(0.0).accepts(&result));
    }

    #[test]
    fn test_threshold_is_monotonic() {
        let result = best_match("lok sistem", ["lock system"]);
        let mut previously_accepted = true;
        for step in 0..=20 {
            let strictness = step as f64 / 20.0;
            let accepted = FuzzyMatcher::new(strictness).accepts(&result);
            assert!(previously_accepted || !accepted, "accepted again at {}", strictness);
            previously_accepted = accepted;
        }
    }

    #[test]
    fn test_find_applies_threshold() {
        let matcher = FuzzyMatcher::new(0.8);
        assert_eq!(
            matcher.find("lok sistem", ["lock system"]).as_deref(),
            Some("lock system")
        );
        assert_eq!(matcher.find("close browser", ["lock system"]), None);
    }
}
