use tracing::{debug, warn};

use crate::model::Tag;
use crate::pairs::{Pair, PairSet};
use crate::relations::ResolvedRelation;
use crate::segments::SegmentSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Resolves the relation currently attached to a candidate pair
pub trait RelationLookup {
    fn resolve_pair(&self, pair: Pair) -> ResolvedRelation;
}

/// Position of the editor within the candidate pairs.
///
/// `left != right` always holds, and after every committed move
/// `{left, right}` is the pair at `pair_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationCursor {
    left: usize,
    right: usize,
    pair_index: usize,
    filter: Option<Tag>,
}

impl NavigationCursor {
    /// Cursor on the first candidate pair, `None` when there is none
    pub fn new(pairs: &PairSet) -> Option<Self> {
        let first = pairs.get(0)?;
        Some(Self {
            left: first.low(),
            right: first.high(),
            pair_index: 0,
            filter: None,
        })
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    pub fn pair_index(&self) -> usize {
        self.pair_index
    }

    pub fn pair(&self) -> Option<Pair> {
        Pair::new(self.left, self.right)
    }

    pub fn filter(&self) -> Option<&Tag> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, filter: Option<Tag>) {
        debug!(filter = ?filter.as_ref().map(|t| t.name.as_str()), "Filter changed");
        self.filter = filter;
    }

    fn matches_filter(filter: Option<&Tag>, pair: Pair, lookup: &dyn RelationLookup) -> bool {
        match filter {
            None => true,
            Some(tag) => lookup.resolve_pair(pair).contains(tag),
        }
    }

    fn land(&mut self, position: usize, pair: Pair) {
        self.pair_index = position;
        self.left = pair.low();
        self.right = pair.high();
    }

    /// Move circularly to the next or previous candidate pair. With a filter
    /// set, pairs whose relation does not carry the filter tag are skipped.
    /// At most every pair is visited once; when none matches the cursor stays
    /// where it was.
    pub fn advance_pair(
        &mut self,
        direction: Direction,
        pairs: &PairSet,
        lookup: &dyn RelationLookup,
    ) -> Option<Pair> {
        let filter = self.filter.as_ref();
        let hit = pairs
            .walk(self.pair_index, direction == Direction::Next)
            .find(|&(_, pair)| Self::matches_filter(filter, pair, lookup));

        match hit {
            Some((position, pair)) => {
                self.land(position, pair);
                debug!(%pair, position, "Moved to pair");
                Some(pair)
            }
            None => {
                debug!(filter = ?self.filter, "No pair matches the filter");
                self.pair()
            }
        }
    }

    /// Move one side among the segments paired with the other, fixed side.
    /// The fixed index itself is never landed on.
    pub fn advance_segment(&mut self, side: Side, direction: Direction, pairs: &PairSet) -> usize {
        let (moving, fixed) = match side {
            Side::Left => (self.left, self.right),
            Side::Right => (self.right, self.left),
        };

        let others: Vec<usize> = pairs
            .eligible(fixed)
            .into_iter()
            .filter(|&i| i != fixed)
            .collect();
        let (Some(&first), Some(&last)) = (others.first(), others.last()) else {
            return moving;
        };

        let target = match direction {
            Direction::Next => others.iter().copied().find(|&i| i > moving).unwrap_or(first),
            Direction::Previous => others
                .iter()
                .rev()
                .copied()
                .find(|&i| i < moving)
                .unwrap_or(last),
        };

        let Some(pair) = Pair::new(target, fixed) else {
            return moving;
        };
        match pairs.position(pair) {
            Some(position) => {
                match side {
                    Side::Left => self.left = target,
                    Side::Right => self.right = target,
                }
                self.pair_index = position;
                debug!(?side, from = moving, to = target, position, "Moved segment");
                target
            }
            None => {
                warn!(%pair, "Eligible segment has no candidate pair, staying put");
                moving
            }
        }
    }

    /// Advance until a pair without completion flag that also passes the
    /// filter is reached, visiting each pair at most once. A no-op once every
    /// pair is complete or when nothing qualifies.
    pub fn jump_to_next_incomplete(
        &mut self,
        pairs: &PairSet,
        lookup: &dyn RelationLookup,
    ) -> Option<Pair> {
        if pairs.is_empty() || pairs.is_fully_completed() {
            return self.pair();
        }

        let filter = self.filter.as_ref();
        let hit = pairs.walk(self.pair_index, true).find(|&(_, pair)| {
            !pairs.is_completed(pair) && Self::matches_filter(filter, pair, lookup)
        });

        if let Some((position, pair)) = hit {
            self.land(position, pair);
            debug!(%pair, position, "Jumped to incomplete pair");
        }
        self.pair()
    }

    /// Position string shown next to a segment, e.g. "(2/5)"
    pub fn position_label(
        &self,
        side: Side,
        pairs: &PairSet,
        source: SegmentSource,
        segment_count: usize,
    ) -> String {
        let (index, fixed) = match side {
            Side::Left => (self.left, self.right),
            Side::Right => (self.right, self.left),
        };

        match source {
            SegmentSource::PreAnnotated => {
                // Rank counts the fixed index, the total does not.
                let eligible = pairs.eligible(fixed);
                let count = eligible.len().saturating_sub(1);
                match eligible.iter().position(|&i| i == index) {
                    Some(rank) => format!("({}/{})", rank + 1, count),
                    None => format!("(-/{})", count),
                }
            }
            SegmentSource::Derived => format!("({}/{})", index + 1, segment_count),
        }
    }
}
