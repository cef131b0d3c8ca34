//! Participant-scoped views of base statistics
//!
//! Restricts a base result to issues where the participant is assignee,
//! reporter or comment author, then recomputes every count from that subset.
//! No source is queried.

use super::summary::{summarize, SummaryContext, SummaryOptions};
use crate::models::StatisticsResult;
use tracing::debug;

/// Derives participant views from an all-participants result
#[derive(Debug, Clone, Default)]
pub struct ParticipantFilter {
    options: SummaryOptions,
}

impl ParticipantFilter {
    pub fn new(options: SummaryOptions) -> Self {
        Self { options }
    }

    /// Statistics for the issues `participant` is involved in
    ///
    /// The participant list, generation time and degradation report are
    /// project-level facts and carry over from `base` unchanged.
    pub fn filter(&self, base: &StatisticsResult, participant: &str) -> StatisticsResult {
        let digests: Vec<_> = base
            .digests()
            .iter()
            .filter(|d| d.involves(participant))
            .cloned()
            .collect();

        debug!(
            participant = %participant,
            matched = digests.len(),
            of = base.digests().len(),
            "Participant view derived"
        );

        summarize(
            digests,
            SummaryContext {
                participants: &base.participants,
                generated_at: base.generated_at,
                degraded: &base.degraded,
            },
            &self.options,
        )
    }
}
