use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Behavioral occurrences the storefront reports. The collector rejects
/// anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    SearchDates,
    RoomView,
    StartBooking,
    GuestLookupStarted,
    GuestLookupResult,
    GuestLoginSuccess,
    OtpRequested,
    OtpVerified,
    BookingConfirmed,
    BookingAbandoned,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::PageView,
        EventKind::SearchDates,
        EventKind::RoomView,
        EventKind::StartBooking,
        EventKind::GuestLookupStarted,
        EventKind::GuestLookupResult,
        EventKind::GuestLoginSuccess,
        EventKind::OtpRequested,
        EventKind::OtpVerified,
        EventKind::BookingConfirmed,
        EventKind::BookingAbandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::SearchDates => "search_dates",
            EventKind::RoomView => "room_view",
            EventKind::StartBooking => "start_booking",
            EventKind::GuestLookupStarted => "guest_lookup_started",
            EventKind::GuestLookupResult => "guest_lookup_result",
            EventKind::GuestLoginSuccess => "guest_login_success",
            EventKind::OtpRequested => "otp_requested",
            EventKind::OtpVerified => "otp_verified",
            EventKind::BookingConfirmed => "booking_confirmed",
            EventKind::BookingAbandoned => "booking_abandoned",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TelemetryError::UnknownEventKind(s.to_string()))
    }
}
