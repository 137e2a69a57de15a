use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::due_date::{last_day_of_month, resolve_due_date};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 9999;

/// A calendar month, the unit every listing and recurring payment is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("year must be between {MIN_YEAR} and {MAX_YEAR}, got {0}")]
    InvalidYear(i32),
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(PeriodError::InvalidYear(year));
        }
        Ok(Self { month, year })
    }

    pub fn current() -> Self {
        Self::of(Local::now().date_naive())
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        resolve_due_date(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> NaiveDate {
        resolve_due_date(self.year, self.month, last_day_of_month(self.year, self.month) as i32)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.year() == self.year
    }

    /// Date a template with the given day of month falls on in this period
    pub fn reference_date(&self, day_of_month: i32) -> NaiveDate {
        resolve_due_date(self.year, self.month, day_of_month)
    }
}

/// `?month=&year=` query; both default to the current month
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl PeriodQuery {
    pub fn resolve(&self) -> Result<Period, PeriodError> {
        let current = Period::current();
        Period::new(
            self.month.unwrap_or(current.month),
            self.year.unwrap_or(current.year),
        )
    }
}
