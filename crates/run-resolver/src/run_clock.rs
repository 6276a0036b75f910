//! Candidate run selection.
//!
//! Turns a reference instant and a family's cycle definition into an ordered,
//! newest-first list of runs worth asking for. Nothing here reads the system
//! clock; "now" is always passed in.

use chrono::{DateTime, Duration, DurationRound, TimeZone, Timelike, Utc};

use wx_common::{FamilyProfile, LeadHours, ModelFamily, ResolveError, ResolveResult, RunDescriptor};

/// Cycle definition plus the limits that bound a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunClock {
    family: ModelFamily,
    cycle_hours: Vec<u32>,
    lookback: Duration,
    max_candidates: usize,
    min_age: Duration,
}

impl RunClock {
    pub fn new(
        family: ModelFamily,
        cycle_hours: Vec<u32>,
        lookback_hours: u32,
        max_candidates: usize,
    ) -> Self {
        let mut cycle_hours = cycle_hours;
        cycle_hours.sort_unstable();
        cycle_hours.dedup();
        Self {
            family,
            cycle_hours,
            lookback: Duration::hours(lookback_hours as i64),
            max_candidates,
            min_age: Duration::zero(),
        }
    }

    pub fn from_profile(profile: &FamilyProfile) -> Self {
        Self::new(
            profile.family,
            profile.cycle_hours.clone(),
            profile.lookback_hours,
            profile.max_candidates,
        )
        .with_min_age(Duration::minutes(profile.min_age_minutes as i64))
    }

    /// Publication delay subtracted from the reference instant.
    pub fn with_min_age(mut self, min_age: Duration) -> Self {
        self.min_age = min_age;
        self
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Newest-first issue instants within the lookback window.
    ///
    /// The first candidate is the latest cycle at or before
    /// `reference - min_age`; each following one is the previous cycle,
    /// crossing midnight as needed. Stops at `max_candidates` or when the
    /// next cycle would be older than `reference - min_age - lookback`.
    pub fn issue_times<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> Vec<DateTime<Utc>> {
        let effective = reference.with_timezone(&Utc) - self.min_age;
        let horizon = effective - self.lookback;

        let Ok(mut cursor) = effective.duration_trunc(Duration::hours(1)) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(self.max_candidates);
        while out.len() < self.max_candidates && cursor >= horizon {
            if self.cycle_hours.contains(&cursor.hour()) {
                out.push(cursor);
            }
            cursor -= Duration::hours(1);
        }
        out
    }

    /// Candidate runs for the given lead range.
    pub fn candidates<Tz: TimeZone>(
        &self,
        reference: &DateTime<Tz>,
        leads: LeadHours,
    ) -> ResolveResult<Vec<RunDescriptor>> {
        leads.validate()?;
        let runs: Vec<RunDescriptor> = self
            .issue_times(reference)
            .into_iter()
            .map(|issued| RunDescriptor {
                family: self.family,
                issued,
                leads,
            })
            .collect();

        if runs.is_empty() {
            return Err(ResolveError::invalid_input(format!(
                "no {} cycle within {}h of {}",
                self.family,
                self.lookback.num_hours(),
                reference.with_timezone(&Utc)
            )));
        }
        Ok(runs)
    }
}
