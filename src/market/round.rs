//! Round identity and period arithmetic

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Underlying asset of an up/down series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    #[default]
    Btc,
    Eth,
    Sol,
    Xrp,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "btc",
            Symbol::Eth => "eth",
            Symbol::Sol => "sol",
            Symbol::Xrp => "xrp",
        }
    }

    /// Name used in daily slugs
    pub fn full_name(&self) -> &'static str {
        match self {
            Symbol::Btc => "bitcoin",
            Symbol::Eth => "ethereum",
            Symbol::Sol => "solana",
            Symbol::Xrp => "xrp",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" => Ok(Symbol::Btc),
            "eth" => Ok(Symbol::Eth),
            "sol" => Ok(Symbol::Sol),
            "xrp" => Ok(Symbol::Xrp),
            other => Err(Error::Config(format!("unknown symbol: {other}"))),
        }
    }
}

/// Length of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "daily")]
    Daily,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::FifteenMinutes => "15m",
            Period::OneHour => "1h",
            Period::FourHours => "4h",
            Period::Daily => "daily",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Period::FifteenMinutes => Duration::minutes(15),
            Period::OneHour => Duration::hours(1),
            Period::FourHours => Duration::hours(4),
            Period::Daily => Duration::days(1),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "15m" => Ok(Period::FifteenMinutes),
            "1h" => Ok(Period::OneHour),
            "4h" => Ok(Period::FourHours),
            "daily" => Ok(Period::Daily),
            other => Err(Error::Config(format!("unknown period: {other}"))),
        }
    }
}

/// Start of the round containing `now`
///
/// Boundaries are counted from UTC midnight, so a 4h period starts at
/// 00:00, 04:00, ... regardless of the Unix epoch phase.
pub fn align_start(now: DateTime<Utc>, period: Period) -> DateTime<Utc> {
    let midnight = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);
    if period == Period::Daily {
        return midnight;
    }
    let period_secs = period.duration().num_seconds();
    let elapsed = i64::from(now.num_seconds_from_midnight());
    midnight + Duration::seconds(elapsed / period_secs * period_secs)
}

/// Start of the round to follow on startup
///
/// A round that began more than `grace` ago is skipped in favour of the next one.
pub fn startup_start(now: DateTime<Utc>, period: Period, grace: Duration) -> DateTime<Utc> {
    let start = align_start(now, period);
    if now - start > grace {
        start + period.duration()
    } else {
        start
    }
}

/// Start of the round after the one starting at `start`
///
/// Derived from period boundaries, never from a listed end time.
pub fn next_start(start: DateTime<Utc>, period: Period) -> DateTime<Utc> {
    align_start(start, period) + period.duration()
}

/// External lookup key for a round
pub fn round_slug(symbol: Symbol, period: Period, start: DateTime<Utc>) -> String {
    match period {
        Period::Daily => format!(
            "{}-up-or-down-on-{}-{}",
            symbol.full_name(),
            month_name(start.month()),
            start.day()
        ),
        _ => format!("{}-updown-{}-{}", symbol, period, start.timestamp()),
    }
}

fn month_name(month: u32) -> &'static str {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    MONTHS[(month.clamp(1, 12) - 1) as usize]
}

/// Logical side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Up => "UP",
            Outcome::Down => "DOWN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tradable token with its side label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub token_id: String,
    pub outcome: Outcome,
}

/// One instance of a recurring up/down market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub slug: String,
    pub up: Instrument,
    pub down: Instrument,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Round {
    /// Build a round; the end must come after the start
    pub fn new(
        slug: impl Into<String>,
        up_token: impl Into<String>,
        down_token: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self> {
        let slug = slug.into();
        if end <= start {
            return Err(Error::Round(format!(
                "{slug}: end {end} is not after start {start}"
            )));
        }
        Ok(Self {
            slug,
            up: Instrument {
                token_id: up_token.into(),
                outcome: Outcome::Up,
            },
            down: Instrument {
                token_id: down_token.into(),
                outcome: Outcome::Down,
            },
            start,
            end,
        })
    }

    /// Both token ids, up first
    pub fn token_ids(&self) -> Vec<String> {
        vec![self.up.token_id.clone(), self.down.token_id.clone()]
    }

    pub fn instrument(&self, token_id: &str) -> Option<&Instrument> {
        [&self.up, &self.down]
            .into_iter()
            .find(|i| i.token_id == token_id)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.end - now
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::zero()
    }
}
