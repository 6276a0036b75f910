//! Time handling for model runs.

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::family::{FamilyProfile, ModelFamily};

/// A range of forecast lead hours: `start..=end` every `step` hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadHours {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl LeadHours {
    pub fn new(start: u32, end: u32, step: u32) -> Self {
        Self { start, end, step }
    }

    /// Analysis products carry a single lead hour of zero.
    pub fn analysis() -> Self {
        Self::new(0, 0, 1)
    }

    /// Generate the list of lead hours.
    pub fn hours(&self) -> Vec<u32> {
        (self.start..=self.end)
            .step_by(self.step.max(1) as usize)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.step == 0 {
            return Err(ResolveError::invalid_input("lead hour step must be positive"));
        }
        if self.end < self.start {
            return Err(ResolveError::invalid_input(format!(
                "lead hour range {}..{} is inverted",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

impl fmt::Display for LeadHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{:03}-f{:03}/{}h", self.start, self.end, self.step)
    }
}

/// One issuance of a model family, with the lead hours requested from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub family: ModelFamily,
    /// Model run/reference time
    pub issued: DateTime<Utc>,
    pub leads: LeadHours,
}

impl RunDescriptor {
    /// Create a run, checking that `issued` sits on one of the family's cycle hours.
    pub fn new(
        profile: &FamilyProfile,
        issued: DateTime<Utc>,
        leads: LeadHours,
    ) -> Result<Self, ResolveError> {
        leads.validate()?;
        if issued.minute() != 0 || issued.second() != 0 || issued.nanosecond() != 0 {
            return Err(ResolveError::invalid_input(format!(
                "{} run {} is not on a whole hour",
                profile.family, issued
            )));
        }
        if !profile.cycle_hours.contains(&issued.hour()) {
            return Err(ResolveError::invalid_input(format!(
                "{} does not issue at {:02}Z (cycles: {:?})",
                profile.family,
                issued.hour(),
                profile.cycle_hours
            )));
        }
        Ok(Self {
            family: profile.family,
            issued,
            leads,
        })
    }

    /// Same issuance with a different lead-hour range.
    pub fn with_leads(&self, leads: LeadHours) -> Self {
        Self { leads, ..*self }
    }

    pub fn cycle(&self) -> u32 {
        self.issued.hour()
    }

    /// `YYYYMMDD` date component used in provider paths.
    pub fn date_str(&self) -> String {
        self.issued.format("%Y%m%d").to_string()
    }

    /// Valid time of a lead hour of this run.
    pub fn valid_time(&self, lead_hour: u32) -> DateTime<Utc> {
        self.issued + Duration::hours(lead_hour as i64)
    }

    /// Generate a staging path component for this run.
    pub fn stamp(&self) -> String {
        format!("{}_{}", self.family, self.issued.format("%Y%m%d_%Hz"))
    }
}

impl fmt::Display for RunDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.family,
            self.issued.format("%Y-%m-%dT%H:%MZ"),
            self.leads
        )
    }
}

/// Parse a reference instant that carries an explicit offset.
///
/// Naive timestamps (no `Z` or `+hh:mm`) are rejected rather than guessed.
pub fn parse_reference_instant(s: &str) -> Result<DateTime<Utc>, ResolveError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }

    if NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%dT%H:%M").is_ok()
    {
        return Err(ResolveError::invalid_input(format!(
            "reference instant '{s}' has no timezone offset"
        )));
    }

    Err(ResolveError::invalid_input(format!(
        "invalid reference instant '{s}', expected RFC 3339"
    )))
}

/// Attach a timezone to a wall-clock time, refusing ambiguous or skipped local times.
pub fn reference_from_local<Tz: TimeZone>(
    tz: &Tz,
    local: NaiveDateTime,
) -> Result<DateTime<Utc>, ResolveError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Err(ResolveError::invalid_input(format!(
            "local time {local} is ambiguous in this timezone"
        ))),
        LocalResult::None => Err(ResolveError::invalid_input(format!(
            "local time {local} does not exist in this timezone"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_lead_hours() {
        assert_eq!(LeadHours::new(0, 12, 3).hours(), vec![0, 3, 6, 9, 12]);
        assert_eq!(LeadHours::analysis().hours(), vec![0]);
        assert!(LeadHours::new(6, 0, 1).validate().is_err());
    }

    #[test]
    fn test_run_alignment() {
        let profile = FamilyProfile::builtin(ModelFamily::Gfs);
        let ok = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let run = RunDescriptor::new(&profile, ok, LeadHours::analysis()).unwrap();
        assert_eq!(run.stamp(), "gfs_20240115_12z");

        let off_cycle = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        assert!(RunDescriptor::new(&profile, off_cycle, LeadHours::analysis()).is_err());

        let off_hour = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        assert!(RunDescriptor::new(&profile, off_hour, LeadHours::analysis()).is_err());
    }

    #[test]
    fn test_parse_reference_instant() {
        let dt = parse_reference_instant("2024-01-01T05:00:00Z").unwrap();
        assert_eq!(dt.hour(), 5);

        let shifted = parse_reference_instant("2024-01-01T05:00:00-05:00").unwrap();
        assert_eq!(shifted.hour(), 10);

        assert!(matches!(
            parse_reference_instant("2024-01-01T05:00:00"),
            Err(ResolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reference_from_fixed_offset() {
        let tz = FixedOffset::west_opt(6 * 3600).unwrap();
        let local = NaiveDateTime::parse_from_str("2024-07-01T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let dt = reference_from_local(&tz, local).unwrap();
        assert_eq!(dt.hour(), 0);
    }
}
