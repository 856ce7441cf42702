use std::{
    str::FromStr,
    time::{
        Duration,
        SystemTime,
    },
};

use bitflags::bitflags;
use chrono::{
    DateTime,
    Utc,
};

bitflags! {
    /// How a schedule expression is interpreted at registration.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ParseOptions: u32 {
        /// The expression carries a leading seconds column (six fields
        /// instead of the standard five).
        const SECONDS = 1 << 0;
        /// Allow `@every <duration>` and `@hourly`-style descriptors.
        const DESCRIPTOR = 1 << 1;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleParseError {
    #[error("invalid cron expression {expr:?}: {source}")]
    Cron {
        expr: String,
        source: cron::error::Error,
    },
    #[error("invalid interval in {expr:?}: {source}")]
    Interval {
        expr: String,
        source: humantime::DurationError,
    },
    #[error("interval must be positive in {expr:?}")]
    ZeroInterval { expr: String },
    #[error("descriptor {expr:?} requires ParseOptions::DESCRIPTOR")]
    DescriptorNotAllowed { expr: String },
}

/// A parsed firing schedule. Either a fixed interval (`@every 30s`) or a
/// cron expression evaluated in UTC.
#[derive(Clone, Debug)]
pub enum Schedule {
    Every(Duration),
    Cron(cron::Schedule),
}

impl Schedule {
    pub fn parse(expr: &str, options: ParseOptions) -> Result<Self, ScheduleParseError> {
        let trimmed = expr.trim();
        if let Some(descriptor) = trimmed.strip_prefix('@') {
            if !options.contains(ParseOptions::DESCRIPTOR) {
                return Err(ScheduleParseError::DescriptorNotAllowed {
                    expr: trimmed.to_string(),
                });
            }
            if let Some(interval) = descriptor.strip_prefix("every ") {
                let duration = humantime::parse_duration(interval.trim()).map_err(|source| {
                    ScheduleParseError::Interval {
                        expr: trimmed.to_string(),
                        source,
                    }
                })?;
                if duration.is_zero() {
                    return Err(ScheduleParseError::ZeroInterval {
                        expr: trimmed.to_string(),
                    });
                }
                return Ok(Schedule::Every(duration));
            }
            // @hourly and friends are understood by the cron engine itself.
            return Self::parse_cron(trimmed);
        }
        if options.contains(ParseOptions::SECONDS) {
            Self::parse_cron(trimmed)
        } else {
            // The cron engine always wants a seconds column; a standard
            // five-field expression fires at second zero.
            Self::parse_cron(&format!("0 {trimmed}"))
        }
    }

    fn parse_cron(expr: &str) -> Result<Self, ScheduleParseError> {
        cron::Schedule::from_str(expr)
            .map(Schedule::Cron)
            .map_err(|source| ScheduleParseError::Cron {
                expr: expr.to_string(),
                source,
            })
    }

    /// The first fire time strictly after `t`, if the schedule has one.
    pub fn next_after(&self, t: SystemTime) -> Option<SystemTime> {
        match self {
            Schedule::Every(interval) => Some(t + *interval),
            Schedule::Cron(schedule) => {
                let after = DateTime::<Utc>::from(t);
                schedule.after(&after).next().map(SystemTime::from)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{
        Duration,
        SystemTime,
    };

    use super::{
        ParseOptions,
        Schedule,
        ScheduleParseError,
    };

    #[test]
    fn test_every_descriptor() {
        let schedule = Schedule::parse("@every 1s", ParseOptions::DESCRIPTOR).unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(
            schedule.next_after(t),
            Some(t + Duration::from_secs(1)),
        );
    }

    #[test]
    fn test_descriptor_requires_option() {
        let err = Schedule::parse("@every 1s", ParseOptions::empty()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::DescriptorNotAllowed { .. }));
    }

    #[test]
    fn test_standard_five_field_expression() {
        // Every minute at second zero.
        let schedule = Schedule::parse("* * * * *", ParseOptions::empty()).unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(90);
        let next = schedule.next_after(t).unwrap();
        assert_eq!(next, SystemTime::UNIX_EPOCH + Duration::from_secs(120));
    }

    #[test]
    fn test_seconds_field_expression() {
        let schedule = Schedule::parse("*/5 * * * * *", ParseOptions::SECONDS).unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(61);
        assert_eq!(
            schedule.next_after(t),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(65)),
        );
    }

    #[test]
    fn test_garbage_expression_is_rejected() {
        assert!(Schedule::parse("not a cron line", ParseOptions::empty()).is_err());
        assert!(Schedule::parse("@every quickly", ParseOptions::DESCRIPTOR).is_err());
        assert!(Schedule::parse("@every 0s", ParseOptions::DESCRIPTOR).is_err());
    }
}
