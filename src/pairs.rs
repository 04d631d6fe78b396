use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DuplicatePolicy;
use crate::model::{AnnotationId, RelationAnnotation};
use crate::segments::SegmentStore;

/// Unordered combination of two distinct segment indices, stored low first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    low: usize,
    high: usize,
}

impl Pair {
    /// `None` when both indices are equal
    pub fn new(a: usize, b: usize) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }

    pub fn contains(&self, index: usize) -> bool {
        self.low == index || self.high == index
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.low, self.high)
    }
}

/// Malformed or duplicate relation data met while building the pair set.
/// Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    #[error("relation {relation} points at a span that is not a segment")]
    UnknownEndpoint { relation: AnnotationId },

    #[error("relation {relation} connects segment {segment} with itself")]
    SelfRelation { relation: AnnotationId, segment: usize },

    #[error("relation {relation} follows an unset placeholder for pair {pair}")]
    LegacyPlaceholder { relation: AnnotationId, pair: Pair },

    #[error("relation {relation} repeats edge {dependent} <- {governor}")]
    DuplicateEdge {
        relation: AnnotationId,
        dependent: usize,
        governor: usize,
    },
}

/// How the candidate list was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSource {
    /// Pairs that carry at least one persisted relation
    Relations,
    /// Every combination of distinct segments
    AllCombinations,
}

#[derive(Debug, Clone)]
enum Candidates {
    Listed {
        pairs: Vec<Pair>,
        positions: HashMap<Pair, usize>,
        partners: HashMap<usize, BTreeSet<usize>>,
    },
    // Computed on demand; n segments give n*(n-1)/2 pairs.
    AllCombinations {
        segments: usize,
    },
}

/// Ordered candidate pairs of a session plus their completion flags.
///
/// The candidate list never changes after construction; only completion
/// flags do.
#[derive(Debug, Clone)]
pub struct PairSet {
    candidates: Candidates,
    completed: HashSet<Pair>,
}

impl PairSet {
    /// All combinations of `segments` distinct indices in ascending order
    pub fn all_combinations(segments: usize) -> Self {
        Self {
            candidates: Candidates::AllCombinations { segments },
            completed: HashSet::new(),
        }
    }

    /// Pairs from a fixed list, keeping first occurrence order
    pub fn from_pairs(pairs: impl IntoIterator<Item = Pair>) -> Self {
        let mut list = Vec::new();
        let mut positions = HashMap::new();
        let mut partners: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for pair in pairs {
            if positions.contains_key(&pair) {
                continue;
            }
            positions.insert(pair, list.len());
            list.push(pair);
            partners.entry(pair.low).or_default().insert(pair.high);
            partners.entry(pair.high).or_default().insert(pair.low);
        }
        Self {
            candidates: Candidates::Listed {
                pairs: list,
                positions,
                partners,
            },
            completed: HashSet::new(),
        }
    }

    /// Build the candidate pairs of a pre-annotated document from its
    /// relations, scanning them once in persisted order.
    pub fn enumerate(
        relations: &[RelationAnnotation],
        segments: &SegmentStore,
        policy: DuplicatePolicy,
    ) -> (Self, Vec<IntegrityWarning>) {
        let scan = scan_relations(relations, segments, policy);
        let mut set = Self::from_pairs(scan.order.iter().copied());
        set.completed = scan.completed;
        debug!(
            pairs = set.len(),
            completed = set.completed_count(),
            warnings = scan.warnings.len(),
            "Enumerated pairs from relations"
        );
        (set, scan.warnings)
    }

    /// Every combination of segments, with completion seeded from any
    /// relations already persisted.
    pub fn enumerate_all(
        relations: &[RelationAnnotation],
        segments: &SegmentStore,
        policy: DuplicatePolicy,
    ) -> (Self, Vec<IntegrityWarning>) {
        let scan = scan_relations(relations, segments, policy);
        let mut set = Self::all_combinations(segments.len());
        set.completed = scan.completed;
        (set, scan.warnings)
    }

    pub fn source(&self) -> PairSource {
        match self.candidates {
            Candidates::Listed { .. } => PairSource::Relations,
            Candidates::AllCombinations { .. } => PairSource::AllCombinations,
        }
    }

    pub fn len(&self) -> usize {
        match &self.candidates {
            Candidates::Listed { pairs, .. } => pairs.len(),
            Candidates::AllCombinations { segments } => segments * segments.saturating_sub(1) / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: usize) -> Option<Pair> {
        match &self.candidates {
            Candidates::Listed { pairs, .. } => pairs.get(position).copied(),
            Candidates::AllCombinations { segments } => {
                let mut rest = position;
                for low in 0..*segments {
                    let row = segments - low - 1;
                    if rest < row {
                        return Pair::new(low, low + 1 + rest);
                    }
                    rest -= row;
                }
                None
            }
        }
    }

    /// Position of `pair` in the candidate list
    pub fn position(&self, pair: Pair) -> Option<usize> {
        match &self.candidates {
            Candidates::Listed { positions, .. } => positions.get(&pair).copied(),
            Candidates::AllCombinations { segments } => {
                let n = *segments;
                if pair.high >= n {
                    return None;
                }
                // Rows before `low` hold (n-1) + (n-2) + ... + (n-low) pairs.
                let before = pair.low * (2 * n - pair.low - 1) / 2;
                Some(before + pair.high - pair.low - 1)
            }
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Pair> + '_> {
        match &self.candidates {
            Candidates::Listed { pairs, .. } => Box::new(pairs.iter().copied()),
            Candidates::AllCombinations { segments } => {
                let n = *segments;
                Box::new((0..n).flat_map(move |low| {
                    ((low + 1)..n).filter_map(move |high| Pair::new(low, high))
                }))
            }
        }
    }

    /// Walk the candidate list circularly from `start`, one step at a time,
    /// ending back on `start` after a full lap.
    pub fn walk(&self, start: usize, forward: bool) -> PairWalk<'_> {
        let total = self.len();
        let position = start.min(total.saturating_sub(1));
        PairWalk {
            set: self,
            position,
            current: self.get(position),
            forward,
            remaining: total,
        }
    }

    /// Indices a side may move to while the other side stays on `fixed`:
    /// `fixed` itself plus every index paired with it, ascending.
    pub fn eligible(&self, fixed: usize) -> Vec<usize> {
        match &self.candidates {
            Candidates::Listed { partners, .. } => {
                let mut eligible: BTreeSet<usize> =
                    partners.get(&fixed).cloned().unwrap_or_default();
                eligible.insert(fixed);
                eligible.into_iter().collect()
            }
            Candidates::AllCombinations { segments } => (0..*segments).collect(),
        }
    }

    pub fn is_completed(&self, pair: Pair) -> bool {
        self.completed.contains(&pair)
    }

    /// Returns true when the flag changed
    pub fn mark_completed(&mut self, pair: Pair) -> bool {
        self.completed.insert(pair)
    }

    /// Returns true when the flag changed
    pub fn mark_incomplete(&mut self, pair: Pair) -> bool {
        self.completed.remove(&pair)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_fully_completed(&self) -> bool {
        self.completed_count() >= self.len()
    }
}

/// Iterator returned by [`PairSet::walk`]; yields `(position, pair)`
#[derive(Debug, Clone)]
pub struct PairWalk<'a> {
    set: &'a PairSet,
    position: usize,
    current: Option<Pair>,
    forward: bool,
    remaining: usize,
}

impl Iterator for PairWalk<'_> {
    type Item = (usize, Pair);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let total = self.set.len();
        self.position = if self.forward {
            (self.position + 1) % total
        } else {
            (self.position + total - 1) % total
        };
        let pair = match (&self.set.candidates, self.current) {
            (Candidates::AllCombinations { segments }, Some(current)) => {
                step_combination(current, *segments, self.forward)
            }
            _ => self.set.get(self.position)?,
        };
        self.current = Some(pair);
        Some((self.position, pair))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

// Neighbour of `pair` in ascending combination order over `n` segments,
// wrapping at either end.
fn step_combination(pair: Pair, n: usize, forward: bool) -> Pair {
    let Pair { low, high } = pair;
    let (low, high) = if forward {
        if high + 1 < n {
            (low, high + 1)
        } else if low + 2 < n {
            (low + 1, low + 2)
        } else {
            (0, 1)
        }
    } else if high > low + 1 {
        (low, high - 1)
    } else if low > 0 {
        (low - 1, n - 1)
    } else {
        (n - 2, n - 1)
    };
    Pair { low, high }
}

struct Scan {
    order: Vec<Pair>,
    completed: HashSet<Pair>,
    warnings: Vec<IntegrityWarning>,
}

fn scan_relations(
    relations: &[RelationAnnotation],
    segments: &SegmentStore,
    policy: DuplicatePolicy,
) -> Scan {
    let mut order = Vec::new();
    let mut seen: HashSet<Pair> = HashSet::new();
    let mut completed = HashSet::new();
    let mut warnings = Vec::new();
    let mut directed_seen: HashSet<(usize, usize)> = HashSet::new();
    // Last label per directed edge, used by last-write-wins
    let mut final_labels: HashMap<(usize, usize), bool> = HashMap::new();
    let mut previous: Option<(usize, usize)> = None;

    for relation in relations {
        let (Some(dependent), Some(governor)) = (
            segments.index_of(&relation.dependent),
            segments.index_of(&relation.governor),
        ) else {
            warnings.push(IntegrityWarning::UnknownEndpoint {
                relation: relation.id,
            });
            previous = None;
            continue;
        };

        let Some(pair) = Pair::new(dependent, governor) else {
            warnings.push(IntegrityWarning::SelfRelation {
                relation: relation.id,
                segment: dependent,
            });
            previous = None;
            continue;
        };

        let directed = (dependent, governor);
        let informative = relation.has_informative_label();
        let repeated = !directed_seen.insert(directed);

        match policy {
            DuplicatePolicy::Adjacent => {
                if seen.insert(pair) {
                    order.push(pair);
                    if informative {
                        completed.insert(pair);
                    }
                } else if informative
                    && !completed.contains(&pair)
                    && previous == Some(directed)
                {
                    completed.insert(pair);
                    warnings.push(IntegrityWarning::LegacyPlaceholder {
                        relation: relation.id,
                        pair,
                    });
                } else if repeated {
                    warnings.push(IntegrityWarning::DuplicateEdge {
                        relation: relation.id,
                        dependent,
                        governor,
                    });
                }
            }
            DuplicatePolicy::LastWriteWins => {
                if seen.insert(pair) {
                    order.push(pair);
                }
                if repeated {
                    warnings.push(IntegrityWarning::DuplicateEdge {
                        relation: relation.id,
                        dependent,
                        governor,
                    });
                }
                final_labels.insert(directed, informative);
            }
        }

        previous = Some(directed);
    }

    if policy == DuplicatePolicy::LastWriteWins {
        for ((dependent, governor), informative) in final_labels {
            if informative {
                if let Some(pair) = Pair::new(dependent, governor) {
                    completed.insert(pair);
                }
            }
        }
    }

    for warning in &warnings {
        warn!(%warning, "Integrity issue in persisted relations");
    }

    Scan {
        order,
        completed,
        warnings,
    }
}
