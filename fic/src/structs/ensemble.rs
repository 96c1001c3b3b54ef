//! Ensemble level information (FIG 0/0, FIG 0/9, FIG 0/10, FIG 1/0).

use crate::structs::label::Label;

/// Ensemble lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing decoded since construction or the last reset.
    #[default]
    Unsynced,
    /// Service, component or subchannel facts are accumulating.
    Collecting,
    /// Ensemble name or id resolved.
    Synced,
}

/// Local time offset from FIG 0/9.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalTimeOffset {
    /// Signed whole hours.
    pub hours: i8,
    /// An additional half hour in the direction of `hours`.
    pub half_hour: bool,
}

/// Date and time from FIG 0/10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Converts a Modified Julian Date to a Gregorian calendar date.
    pub fn from_mjd(mjd: u32) -> (i32, u8, u8) {
        let j = mjd as i64 + 2_400_001 + 32_044;
        let g = j / 146_097;
        let dg = j % 146_097;
        let c = ((dg / 36_524) + 1) * 3 / 4;
        let dc = dg - c * 36_524;
        let b = dc / 1461;
        let db = dc % 1461;
        let a = ((db / 365) + 1) * 3 / 4;
        let da = db - a * 365;
        let y = g * 400 + c * 100 + b * 4 + a;
        let m = ((da * 5 + 308) / 153) - 2;
        let d = da - ((m + 4) * 153 / 5) + 122;

        let year = y - 4800 + ((m + 2) / 12);
        let month = ((m + 2) % 12) + 1;
        let day = d + 1;

        (year as i32, month as u8, day as u8)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ensemble {
    pub state: SyncState,
    pub id: Option<u32>,
    pub label: Option<Label>,
    /// Change flag and alarm bit of the last FIG 0/0.
    pub change_flags: u8,
    pub alarm: bool,
    pub date_time: Option<DateTime>,
    pub local_time_offset: Option<LocalTimeOffset>,
}

impl Ensemble {
    /// Moves out of `Unsynced` once any fact has been decoded.
    pub fn collecting(&mut self) {
        if self.state == SyncState::Unsynced {
            self.state = SyncState::Collecting;
        }
    }

    pub fn synced(&mut self) {
        self.state = SyncState::Synced;
    }
}

#[test]
fn mjd_conversion() {
    assert_eq!(DateTime::from_mjd(51544), (2000, 1, 1));
    assert_eq!(DateTime::from_mjd(60000), (2023, 2, 25));
    assert_eq!(DateTime::from_mjd(44970), (1982, 1, 1));
}
