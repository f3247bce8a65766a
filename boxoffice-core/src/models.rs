use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub total_seats: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: i64,
    pub show_id: i64,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub held_by: Option<i64>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    /// Status/holder/lease combination is one of the three legal shapes.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SeatStatus::Available => self.held_by.is_none() && self.hold_expires_at.is_none(),
            SeatStatus::Held => self.held_by.is_some() && self.hold_expires_at.is_some(),
            SeatStatus::Booked => self.held_by.is_some() && self.hold_expires_at.is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Expired,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub show_id: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatStatistics {
    pub available: i64,
    pub held: i64,
    pub booked: i64,
    pub total: i64,
}

impl SeatStatistics {
    pub fn record(&mut self, status: SeatStatus, count: i64) {
        match status {
            SeatStatus::Available => self.available += count,
            SeatStatus::Held => self.held += count,
            SeatStatus::Booked => self.booked += count,
        }
        self.total += count;
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(StoreError::Corrupt(format!(
                        concat!("unknown ", stringify!($ty), " value: {}"),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(SeatStatus {
    Available => "AVAILABLE",
    Held => "HELD",
    Booked => "BOOKED",
});

text_enum!(BookingStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Expired => "EXPIRED",
    Cancelled => "CANCELLED",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        assert_eq!("HELD".parse::<SeatStatus>().unwrap(), SeatStatus::Held);
        assert_eq!(BookingStatus::Cancelled.to_string(), "CANCELLED");
        assert!("held".parse::<SeatStatus>().is_err());
    }

    #[test]
    fn test_statistics_total_tracks_counts() {
        let mut stats = SeatStatistics::default();
        stats.record(SeatStatus::Available, 3);
        stats.record(SeatStatus::Held, 2);
        stats.record(SeatStatus::Booked, 1);
        assert_eq!(stats.total, stats.available + stats.held + stats.booked);
        assert_eq!(stats.total, 6);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Expired.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serializes_status_in_screaming_case() {
        let json = serde_json::to_string(&SeatStatus::Available).unwrap();
        assert_eq!(json, "\"AVAILABLE\"");
    }
}
