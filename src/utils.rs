use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rand::Rng;
use serde::Serializer;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

pub fn serialize_date<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

pub fn from_naive(date: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date)
}

/// Six lowercase base-36 digits, zero padded.
pub fn random_suffix() -> String {
    let mut value: u64 = rand::thread_rng().gen_range(0..36u64.pow(SUFFIX_LEN as u32));
    let mut digits = [b'0'; SUFFIX_LEN];
    for digit in digits.iter_mut().rev() {
        *digit = BASE36[(value % 36) as usize];
        value /= 36;
    }
    digits.iter().map(|&d| d as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_six_base36_digits() {
        for _ in 0..200 {
            let suffix = random_suffix();
            assert_eq!(suffix.len(), 6);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn dates_keep_milliseconds() {
        let date = Utc.with_ymd_and_hms(2016, 2, 18, 3, 22, 56).unwrap()
            + chrono::Duration::milliseconds(637);
        let json = {
            let mut out = Vec::new();
            let mut serializer = serde_json::Serializer::new(&mut out);
            serialize_date(&date, &mut serializer).unwrap();
            String::from_utf8(out).unwrap()
        };
        assert_eq!(json, "\"2016-02-18T03:22:56.637Z\"");
    }
}
