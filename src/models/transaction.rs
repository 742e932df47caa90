use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_NOTE_LEN: usize = 255;

/// Largest accepted magnitude, 9,007,199,254,740.99. Amounts are stored as
/// REAL, and every cent value up to this bound survives the round trip.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(858_993_459, 209_715, 0, false, 2);

/// Date formats accepted from users and import files.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(Error::InvalidInput(format!(
                "Invalid transaction type '{}'. Use 'income' or 'expense'.",
                other
            ))),
        }
    }
}

/// A stored income or expense event.
///
/// `amount` is always a positive magnitude; `kind` decides its sign.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub amount: Decimal,
    pub kind: TransactionType,
    pub category: String,
    pub note: String,
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// The amount with expenses shown as negative numbers.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    pub fn calendar_date(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// The user-supplied fields of a transaction, used for both inserts and
/// full-row updates.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub kind: TransactionType,
    pub category: String,
    pub note: String,
    /// `None` means "now" on insert and "keep the stored date" on update.
    pub date: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(
        amount: Decimal,
        kind: TransactionType,
        category: impl Into<String>,
        note: impl Into<String>,
        date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            amount,
            kind,
            category: category.into(),
            note: note.into(),
            date,
        }
    }

    /// Checks the input and returns it in the form the store writes:
    /// a positive amount with two decimal places, a trimmed category and a
    /// date at millisecond precision.
    ///
    /// Negative expense amounts are accepted and flipped, since older data
    /// recorded expenses that way. A negative income is rejected.
    pub fn normalized(&self) -> Result<NewTransaction> {
        let mut amount = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount.is_zero() {
            return Err(Error::InvalidInput("Amount must not be zero.".to_string()));
        }
        if amount.is_sign_negative() {
            match self.kind {
                TransactionType::Expense => amount = amount.abs(),
                TransactionType::Income => {
                    return Err(Error::InvalidInput(
                        "Income amount must be positive.".to_string(),
                    ));
                }
            }
        }
        if amount > MAX_AMOUNT {
            return Err(Error::InvalidInput(format!(
                "Amount too large. The maximum is {}.",
                MAX_AMOUNT
            )));
        }

        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(Error::InvalidInput("Category cannot be empty.".to_string()));
        }
        if category.chars().count() > MAX_CATEGORY_LEN {
            return Err(Error::InvalidInput("Category too long.".to_string()));
        }

        let note = self.note.trim().to_string();
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(Error::InvalidInput("Note too long.".to_string()));
        }

        let date = self.date.map(truncate_to_millis).transpose()?;

        Ok(NewTransaction {
            amount,
            kind: self.kind,
            category,
            note,
            date,
        })
    }
}

/// Parses a calendar date in `YYYY-MM-DD` or `DD/MM/YYYY` form.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .ok_or_else(|| Error::InvalidDate(input.to_string()))
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub fn truncate_to_millis(date: DateTime<Utc>) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(date.timestamp_millis())
        .ok_or_else(|| Error::InvalidDate(date.to_rfc3339()))
}
