// libs/appointment-cell/src/services/slot_key.rs
use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::AppointmentError;

/// Owner token used before a doctor has been assigned.
pub const PENDING_OWNER: &str = "PENDING";

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?P<h>\d{1,2})(?:[:.h]?(?P<m>\d{2}))?(?::\d{2})?\s*(?P<half>[ap])?\.?\s*(?:m\.?)?$")
            .expect("time pattern is valid")
    })
}

/// Canonical zero-padded 24-hour `HH:MM` for loosely typed times such as
/// `9:00`, `0900`, `9.30`, `09:00:00`, `9 pm` or `12:15 a.m.`.
pub fn normalize_time(raw: &str) -> Result<String, AppointmentError> {
    let invalid = || AppointmentError::Validation(format!("Invalid appointment time: {:?}", raw));

    let captures = time_pattern().captures(raw.trim()).ok_or_else(invalid)?;

    let hour: u32 = captures["h"].parse().map_err(|_| invalid())?;
    let minute: u32 = captures
        .name("m")
        .map(|m| m.as_str().parse::<u32>())
        .transpose()
        .map_err(|_| invalid())?
        .unwrap_or(0);

    let hour = match captures.name("half").map(|h| h.as_str().to_ascii_lowercase()) {
        Some(half) => {
            if !(1..=12).contains(&hour) {
                return Err(invalid());
            }
            match (half.as_str(), hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                (_, 12) => 12,
                (_, h) => h + 12,
            }
        }
        None => hour,
    };

    if hour > 23 || minute > 59 {
        return Err(invalid());
    }

    Ok(format!("{:02}:{:02}", hour, minute))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::Validation(format!("Invalid appointment date: {:?}, expected YYYY-MM-DD", raw)))
}

/// `{owner}_{date}_{time}` with characters that are not safe in a record id
/// replaced by `-`.
pub fn encode_slot_key(owner: &str, date: NaiveDate, normalized_time: &str) -> String {
    format!("{}_{}_{}", owner, date.format("%Y-%m-%d"), normalized_time)
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | '.' | '#' | '$' | '[' | ']' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOwner {
    Doctor(String),
    Pending,
}

impl SlotOwner {
    pub fn for_doctor(doctor_id: Option<&str>) -> Self {
        match doctor_id {
            Some(id) => SlotOwner::Doctor(id.to_string()),
            None => SlotOwner::Pending,
        }
    }
}

impl fmt::Display for SlotOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotOwner::Doctor(id) => write!(f, "{}", id),
            SlotOwner::Pending => write!(f, "{}", PENDING_OWNER),
        }
    }
}

/// An (owner, date, normalized time) triple a booking holds or wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotClaim {
    pub owner: SlotOwner,
    pub date: NaiveDate,
    pub time: String,
}

impl SlotClaim {
    pub fn new(owner: SlotOwner, date: NaiveDate, raw_time: &str) -> Result<Self, AppointmentError> {
        Ok(Self {
            owner,
            date,
            time: normalize_time(raw_time)?,
        })
    }

    /// Claim for a time already stored on a booking. Stored values that no
    /// longer parse are kept verbatim so the old key can still be released.
    pub fn from_stored(owner: SlotOwner, date: NaiveDate, stored_time: &str) -> Self {
        let time = normalize_time(stored_time).unwrap_or_else(|_| stored_time.to_string());
        Self { owner, date, time }
    }

    pub fn key(&self) -> String {
        encode_slot_key(&self.owner.to_string(), self.date, &self.time)
    }
}
