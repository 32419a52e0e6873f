//! Amateur bands the controller is stepped through with band up/down.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub name: &'static str,
    pub low_hz: u32,
    pub high_hz: u32,
}

pub const BANDS: &[Band] = &[
    Band { name: "40m", low_hz: 7_000_000, high_hz: 7_300_000 },
    Band { name: "30m", low_hz: 10_100_000, high_hz: 10_150_000 },
    Band { name: "20m", low_hz: 14_000_000, high_hz: 14_350_000 },
    Band { name: "17m", low_hz: 18_068_000, high_hz: 18_168_000 },
    Band { name: "15m", low_hz: 21_000_000, high_hz: 21_450_000 },
    Band { name: "12m", low_hz: 24_890_000, high_hz: 24_990_000 },
    Band { name: "10m", low_hz: 28_000_000, high_hz: 29_700_000 },
    Band { name: "6m", low_hz: 50_000_000, high_hz: 54_000_000 },
];

pub fn band_of(frequency_hz: u32) -> Option<&'static Band> {
    BANDS
        .iter()
        .find(|b| (b.low_hz..=b.high_hz).contains(&frequency_hz))
}

/// Bottom of the next band up. Anything at or below a band's top edge
/// counts as that band; 6m wraps to 40m. Above 6m nothing changes.
pub fn band_up(frequency_hz: u32) -> u32 {
    match BANDS.iter().position(|b| frequency_hz <= b.high_hz) {
        Some(i) => BANDS[(i + 1) % BANDS.len()].low_hz,
        None => frequency_hz,
    }
}

/// Bottom of the next band down, 40m wrapping to 6m. Below 40m nothing
/// changes.
pub fn band_down(frequency_hz: u32) -> u32 {
    match BANDS.iter().rposition(|b| frequency_hz >= b.low_hz) {
        Some(i) => BANDS[(i + BANDS.len() - 1) % BANDS.len()].low_hz,
        None => frequency_hz,
    }
}
