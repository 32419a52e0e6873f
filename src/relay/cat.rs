//! Frequency reports in the transceiver's CAT stream.
//!
//! Only `FA` followed by 11 ASCII digits (VFO A in hertz) is recognized;
//! every other byte is relayed without being looked at.

const TAG: &[u8; 2] = b"FA";
const DIGITS: usize = 11;
const REPORT_LEN: usize = TAG.len() + DIGITS;

/// Most recent frequency report in `buf`, if any.
pub fn last_frequency_report(buf: &[u8]) -> Option<u64> {
    if buf.len() < REPORT_LEN {
        return None;
    }
    (0..=buf.len() - REPORT_LEN)
        .rev()
        .find_map(|i| parse_report(&buf[i..i + REPORT_LEN]))
}

fn parse_report(w: &[u8]) -> Option<u64> {
    let digits = w.strip_prefix(TAG)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')),
    )
}

/// Scans successive chunks, carrying a short tail so a report split across
/// two reads is still found. The tail is one byte shorter than a report,
/// so a report is never seen twice.
#[derive(Debug, Default)]
pub struct FrequencyScanner {
    tail: Vec<u8>,
}

impl FrequencyScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Option<u64> {
        self.tail.extend_from_slice(chunk);
        let found = last_frequency_report(&self.tail);
        let keep = self.tail.len().min(REPORT_LEN - 1);
        self.tail.drain(..self.tail.len() - keep);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report() {
        assert_eq!(last_frequency_report(b"FA00014000000;"), Some(14_000_000));
    }

    #[test]
    fn ignores_other_traffic() {
        assert_eq!(last_frequency_report(b"MD2;IF;"), None);
        assert_eq!(last_frequency_report(b"FA;"), None);
        assert_eq!(last_frequency_report(b"FA0001400000X;"), None);
        assert_eq!(last_frequency_report(b"FB00014000000;"), None);
    }

    #[test]
    fn takes_last_report_in_chunk() {
        let chunk = b"FA00007074000;MD2;FA00007076000;";
        assert_eq!(last_frequency_report(chunk), Some(7_076_000));
    }

    #[test]
    fn finds_report_among_other_commands() {
        assert_eq!(last_frequency_report(b"PS1;FA00050313000;SM0005;"), Some(50_313_000));
    }

    #[test]
    fn scanner_joins_split_report() {
        let mut s = FrequencyScanner::new();
        assert_eq!(s.feed(b"MD2;FA000140"), None);
        assert_eq!(s.feed(b"74000;"), Some(14_074_000));
    }

    #[test]
    fn scanner_does_not_repeat_a_report() {
        let mut s = FrequencyScanner::new();
        assert_eq!(s.feed(b"FA00021074000;"), Some(21_074_000));
        assert_eq!(s.feed(b";"), None);
        assert_eq!(s.feed(b"SM0000;"), None);
    }

    #[test]
    fn scanner_tail_stays_bounded() {
        let mut s = FrequencyScanner::new();
        for _ in 0..100 {
            s.feed(b"IF00014074000     +000000000;");
        }
        assert!(s.tail.len() < REPORT_LEN);
    }
}
