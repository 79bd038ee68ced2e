//! Market-hours gate
//!
//! Decides whether a periodic trigger should run a refresh: trading weekday,
//! not a configured holiday, and within the session window (both ends
//! inclusive) in the trading timezone.

use crate::config::MarketConfig;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;

/// Why a timestamp is or is not eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Open,
    NonTradingDay,
    Holiday,
    BeforeOpen,
    AfterClose,
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, GateDecision::Open)
    }
}

impl std::fmt::Display for GateDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            GateDecision::Open => "market open",
            GateDecision::NonTradingDay => "not a trading day",
            GateDecision::Holiday => "market holiday",
            GateDecision::BeforeOpen => "before market open",
            GateDecision::AfterClose => "after market close",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct MarketHoursGate {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
    weekdays: Vec<Weekday>,
    holidays: HashSet<NaiveDate>,
}

impl MarketHoursGate {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime, weekdays: Vec<Weekday>) -> Self {
        Self {
            timezone,
            open,
            close,
            weekdays,
            holidays: HashSet::new(),
        }
    }

    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new(config.timezone, config.open, config.close, config.weekdays.clone())
            .with_holidays(config.holidays.iter().copied())
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn decide(&self, ts: DateTime<Utc>) -> GateDecision {
        let local = ts.with_timezone(&self.timezone);

        if !self.weekdays.contains(&local.weekday()) {
            return GateDecision::NonTradingDay;
        }
        if self.holidays.contains(&local.date_naive()) {
            return GateDecision::Holiday;
        }

        let time = local.time();
        if time < self.open {
            GateDecision::BeforeOpen
        } else if time > self.close {
            GateDecision::AfterClose
        } else {
            GateDecision::Open
        }
    }

    pub fn is_eligible(&self, ts: DateTime<Utc>) -> bool {
        self.decide(ts).is_open()
    }
}
