//! Dense ranking of an event's pending requests.
//!
//! Storage adapters call [`rank_pending`] inside the critical section that
//! mutated an event's pending set and persist only the changed ranks.

use chrono::{DateTime, Utc};

use super::{MatchScore, RequestId};

/// Ranking key of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankCandidate {
    /// Request being ranked.
    pub id: RequestId,
    /// Primary key, descending.
    pub match_score: MatchScore,
    /// Secondary key, ascending.
    pub created_at: DateTime<Utc>,
}

/// Rank computed for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankAssignment {
    /// Ranked request.
    pub id: RequestId,
    /// 1-based position.
    pub rank: u32,
    /// Whether `rank` differs from the currently stored value.
    pub changed: bool,
}

/// Assign ranks 1..N to the given pending candidates.
///
/// Order is score descending, then `created_at` ascending, then request id
/// ascending. `current` supplies the stored rank of each candidate so
/// unchanged rows can be skipped.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use speaker_requests::domain::{rank_pending, MatchScore, RankCandidate, RequestId};
///
/// let now = Utc::now();
/// let low = RankCandidate { id: RequestId::random(), match_score: MatchScore::new(80.0).unwrap(), created_at: now };
/// let high = RankCandidate { id: RequestId::random(), match_score: MatchScore::new(95.0).unwrap(), created_at: now };
/// let ranks = rank_pending(vec![(low, None), (high, None)]);
/// assert_eq!(ranks[0].id, high.id);
/// assert_eq!(ranks[1].rank, 2);
/// ```
pub fn rank_pending<I>(candidates: I) -> Vec<RankAssignment>
where
    I: IntoIterator<Item = (RankCandidate, Option<u32>)>,
{
    let mut ordered: Vec<(RankCandidate, Option<u32>)> = candidates.into_iter().collect();
    ordered.sort_by(|(a, _), (b, _)| {
        b.match_score
            .cmp(&a.match_score)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    (1..)
        .zip(ordered)
        .map(|(rank, (candidate, current))| RankAssignment {
            id: candidate.id,
            rank,
            changed: current != Some(rank),
        })
        .collect()
}
