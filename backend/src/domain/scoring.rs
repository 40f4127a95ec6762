//! Match scoring for (speaker, event) pairs.
//!
//! Scores are computed once, when a request is created, and never change
//! afterwards. Every scorer is a pure function of the signals it receives.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Finite compatibility score; higher means more compatible.
///
/// Ordering is total so scores can key a sort directly.
///
/// # Examples
/// ```
/// use speaker_requests::domain::MatchScore;
///
/// assert!(MatchScore::new(f64::NAN).is_err());
/// assert!(MatchScore::new(95.0).unwrap() > MatchScore::new(80.0).unwrap());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct MatchScore(f64);

impl MatchScore {
    /// Validate that `value` is finite.
    pub fn new(value: f64) -> Result<Self, ScoringError> {
        if !value.is_finite() {
            return Err(ScoringError::NonFiniteScore);
        }
        // Collapse -0.0 so equal scores compare equal under `total_cmp`.
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    /// Raw score value.
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for MatchScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MatchScore {}

impl PartialOrd for MatchScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for MatchScore {
    type Error = ScoringError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MatchScore> for f64 {
    fn from(value: MatchScore) -> Self {
        value.0
    }
}

impl fmt::Display for MatchScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors raised while validating signals or computing a score.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// The bundle carries nothing that describes compatibility.
    #[error("missing score signals: supply topics, expertise tags, or an event window")]
    MissingSignals,
    /// A supplied or computed score was NaN or infinite.
    #[error("match score must be a finite number")]
    NonFiniteScore,
    /// A historical rating lies outside `0.0..=5.0`.
    #[error("rating {value} is outside 0..=5")]
    RatingOutOfRange {
        /// Offending rating.
        value: f64,
    },
    /// A window ends before it starts.
    #[error("{field} ends before it starts")]
    InvalidWindow {
        /// Which window was malformed.
        field: &'static str,
    },
    /// Weight set is negative, non-finite, or sums to zero.
    #[error("invalid scoring weights: {reason}")]
    InvalidWeights {
        /// Human-readable explanation.
        reason: String,
    },
}

impl ScoringError {
    /// Name of the input field the error refers to.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingSignals => "scoringSignals",
            Self::NonFiniteScore => "scoringSignals.score",
            Self::RatingOutOfRange { .. } => "scoringSignals.speakerRatings",
            Self::InvalidWindow { field } => field,
            Self::InvalidWeights { .. } => "weights",
        }
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl AvailabilityWindow {
    fn validate(&self, field: &'static str) -> Result<(), ScoringError> {
        if self.end < self.start {
            return Err(ScoringError::InvalidWindow { field });
        }
        Ok(())
    }
}

/// Profile-level signals describing a speaker and an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSignals {
    /// Topics the speaker covers.
    pub speaker_topics: Vec<String>,
    /// Expertise tags the speaker holds.
    pub speaker_expertise: Vec<String>,
    /// Windows in which the speaker is available.
    pub speaker_availability: Vec<AvailabilityWindow>,
    /// Historical ratings on a 0..=5 scale.
    pub speaker_ratings: Vec<f64>,
    /// Topics the event covers.
    pub event_topics: Vec<String>,
    /// Expertise tags the event requires.
    pub required_expertise: Vec<String>,
    /// When the event takes place.
    pub event_window: Option<AvailabilityWindow>,
}

impl ProfileSignals {
    fn validate(&self) -> Result<(), ScoringError> {
        let describes_nothing = self.speaker_topics.is_empty()
            && self.event_topics.is_empty()
            && self.speaker_expertise.is_empty()
            && self.required_expertise.is_empty()
            && self.speaker_availability.is_empty()
            && self.event_window.is_none();
        if describes_nothing {
            return Err(ScoringError::MissingSignals);
        }
        if let Some(value) = self
            .speaker_ratings
            .iter()
            .copied()
            .find(|rating| !(0.0..=5.0).contains(rating))
        {
            return Err(ScoringError::RatingOutOfRange { value });
        }
        for window in &self.speaker_availability {
            window.validate("scoringSignals.speakerAvailability")?;
        }
        if let Some(window) = &self.event_window {
            window.validate("scoringSignals.eventWindow")?;
        }
        Ok(())
    }
}

/// Input to a [`MatchScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringSignals {
    /// Score computed by an external system.
    Precomputed {
        /// Supplied score; must be finite.
        score: f64,
    },
    /// Raw profile signals scored by the configured scorer.
    Profile(ProfileSignals),
}

/// Relative importance of each profile signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    topics: f64,
    expertise: f64,
    availability: f64,
    rating: f64,
}

impl ScoringWeights {
    /// Validate a weight set.
    ///
    /// # Examples
    /// ```
    /// use speaker_requests::domain::ScoringWeights;
    ///
    /// assert!(ScoringWeights::new(0.0, 0.0, 0.0, 0.0).is_err());
    /// assert!(ScoringWeights::new(1.0, 0.0, 0.0, 0.0).is_ok());
    /// ```
    pub fn new(
        topics: f64,
        expertise: f64,
        availability: f64,
        rating: f64,
    ) -> Result<Self, ScoringError> {
        let all = [topics, expertise, availability, rating];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ScoringError::InvalidWeights {
                reason: "weights must be finite and non-negative".to_owned(),
            });
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(ScoringError::InvalidWeights {
                reason: "weights must not sum to zero".to_owned(),
            });
        }
        Ok(Self {
            topics,
            expertise,
            availability,
            rating,
        })
    }

    /// Weight of topic overlap.
    pub const fn topics(&self) -> f64 {
        self.topics
    }

    /// Weight of expertise coverage.
    pub const fn expertise(&self) -> f64 {
        self.expertise
    }

    /// Weight of availability fit.
    pub const fn availability(&self) -> f64 {
        self.availability
    }

    /// Weight of past ratings.
    pub const fn rating(&self) -> f64 {
        self.rating
    }

    fn total(&self) -> f64 {
        self.topics + self.expertise + self.availability + self.rating
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            topics: 0.4,
            expertise: 0.3,
            availability: 0.2,
            rating: 0.1,
        }
    }
}

/// Computes the score stored on a new request.
#[cfg_attr(test, mockall::automock)]
pub trait MatchScorer: Send + Sync {
    /// Score a signal bundle. Identical input always yields identical output.
    fn score(&self, signals: &ScoringSignals) -> Result<MatchScore, ScoringError>;
}

/// Rule-based scorer combining weighted profile components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedSignalScorer {
    weights: ScoringWeights,
}

impl WeightedSignalScorer {
    /// Build a scorer with the given weights.
    pub const fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Weights in use.
    pub const fn weights(&self) -> ScoringWeights {
        self.weights
    }

    fn score_profile(&self, profile: &ProfileSignals) -> Result<MatchScore, ScoringError> {
        profile.validate()?;
        let w = &self.weights;
        let weighted = w.topics * topic_overlap(&profile.speaker_topics, &profile.event_topics)
            + w.expertise
                * expertise_coverage(&profile.speaker_expertise, &profile.required_expertise)
            + w.availability
                * availability_coverage(&profile.speaker_availability, profile.event_window)
            + w.rating * rating_component(&profile.speaker_ratings);
        let raw = 100.0 * weighted / w.total();
        MatchScore::new((raw * 10_000.0).round() / 10_000.0)
    }
}

impl MatchScorer for WeightedSignalScorer {
    fn score(&self, signals: &ScoringSignals) -> Result<MatchScore, ScoringError> {
        match signals {
            ScoringSignals::Precomputed { score } => MatchScore::new(*score),
            ScoringSignals::Profile(profile) => self.score_profile(profile),
        }
    }
}

fn folded(tags: &[String]) -> HashSet<String> {
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn topic_overlap(speaker: &[String], event: &[String]) -> f64 {
    let speaker = folded(speaker);
    let event = folded(event);
    let union = speaker.union(&event).count();
    if union == 0 {
        return 0.0;
    }
    speaker.intersection(&event).count() as f64 / union as f64
}

fn expertise_coverage(held: &[String], required: &[String]) -> f64 {
    let required = folded(required);
    if required.is_empty() {
        return 1.0;
    }
    let held = folded(held);
    required.intersection(&held).count() as f64 / required.len() as f64
}

fn availability_coverage(
    windows: &[AvailabilityWindow],
    event: Option<AvailabilityWindow>,
) -> f64 {
    let Some(event) = event else {
        return 1.0;
    };
    if event.start == event.end {
        let covered = windows
            .iter()
            .any(|w| w.start <= event.start && event.start < w.end);
        return if covered { 1.0 } else { 0.0 };
    }

    let mut clipped: Vec<(DateTime<Utc>, DateTime<Utc>)> = windows
        .iter()
        .map(|w| (w.start.max(event.start), w.end.min(event.end)))
        .filter(|(start, end)| start < end)
        .collect();
    clipped.sort_unstable();

    let mut covered = chrono::TimeDelta::zero();
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in clipped {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                covered += ce - cs;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        covered += ce - cs;
    }

    let total = span_seconds(event.end - event.start);
    if total <= 0.0 {
        return 0.0;
    }
    (span_seconds(covered) / total).clamp(0.0, 1.0)
}

/// Length of `delta` in seconds at nanosecond resolution.
fn span_seconds(delta: chrono::TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

fn rating_component(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        return 0.5;
    }
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    mean / 5.0
}
