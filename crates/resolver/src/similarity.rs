use serde::Serialize;

pub const EXACT_SCORE: f64 = 1.0;
pub const EXTENSION_VARIANT_SCORE: f64 = 0.95;
pub const CONTAINMENT_SCORE: f64 = 0.85;
pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Which rule accepted a candidate. Declaration order is ranking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    ExtensionVariant,
    Containment,
    Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarity {
    pub score: f64,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub name: String,
    pub score: f64,
    pub kind: MatchKind,
    /// Position in the candidate list the ranker was given.
    #[serde(skip)]
    pub index: usize,
}

/// Name similarity used to suggest corrected paths.
///
/// Pure and deterministic; the same inputs always produce the same order.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    ratio_threshold: f64,
    limit: usize,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self::new(DEFAULT_RATIO_THRESHOLD, DEFAULT_MAX_SUGGESTIONS)
    }
}

impl SimilarityRanker {
    pub fn new(ratio_threshold: f64, limit: usize) -> Self {
        Self {
            ratio_threshold,
            limit,
        }
    }

    pub fn ratio_threshold(&self) -> f64 {
        self.ratio_threshold
    }

    /// Score of `candidate` against `target`, or `None` when it is not a candidate.
    pub fn score(&self, target: &str, candidate: &str) -> Option<f64> {
        self.classify(target, candidate).map(|s| s.score)
    }

    pub fn classify(&self, target: &str, candidate: &str) -> Option<Similarity> {
        let target = target.trim().to_lowercase();
        let candidate = candidate.trim().to_lowercase();
        if target.is_empty() || candidate.is_empty() {
            return None;
        }
        if target == candidate {
            return Some(Similarity {
                score: EXACT_SCORE,
                kind: MatchKind::Exact,
            });
        }

        let (target_base, target_ext) = split_name(&target);
        let (candidate_base, candidate_ext) = split_name(&candidate);

        if target_base == candidate_base {
            return Some(Similarity {
                score: EXTENSION_VARIANT_SCORE,
                kind: MatchKind::ExtensionVariant,
            });
        }

        if target_base.contains(candidate_base) || candidate_base.contains(target_base) {
            return Some(Similarity {
                score: CONTAINMENT_SCORE,
                kind: MatchKind::Containment,
            });
        }

        if target_ext == candidate_ext {
            let ratio = lcs_ratio(target_base, candidate_base);
            if ratio > self.ratio_threshold {
                return Some(Similarity {
                    score: ratio,
                    kind: MatchKind::Ratio,
                });
            }
        }

        None
    }

    /// Accepted candidates, best first, at most `limit` of them.
    ///
    /// Rule priority decides first, then score; equal entries keep input order.
    pub fn rank<'a, I>(&self, target: &str, candidates: I) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(index, name)| {
                self.classify(target, name).map(|sim| ScoredCandidate {
                    name: name.to_string(),
                    score: sim.score,
                    kind: sim.kind,
                    index,
                })
            })
            .collect();

        // `sort_by` is stable, so ties keep candidate order.
        scored.sort_by(|a, b| {
            a.kind.cmp(&b.kind).then_with(|| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        scored.truncate(self.limit);
        scored
    }
}

/// Splits at the last dot; a leading dot belongs to the base (`.gitignore`).
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// `2 * LCS(a, b) / (|a| + |b|)` over chars.
fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    (2 * lcs) as f64 / total as f64
}
