//! Time-based version IDs (§4.6): `YYYYMMDD-SSSSS-XXXXX` where `SSSSS` is
//! the zero-padded second-of-day in UTC and `XXXXX` is five characters from
//! a 31-letter Crockford-style alphabet. IDs sort lexicographically in
//! chronological order.

use jiff::Timestamp;
use jiff::civil::DateTime;
use rand::Rng;

use crate::error::HoardError;

const ALPHABET: &[u8; 31] = b"23456789abcdefghjkmnpqrstuvwxyz";
const SUFFIX_LEN: usize = 5;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VersionId {
    // Kept as the formatted string directly: it's the canonical
    // representation and the one thing every caller wants (storage key,
    // sort key, display).
    text: [u8; 20],
}

impl VersionId {
    /// Generates a new ID for `now`. Callers retry on a storage collision
    /// (~3.5e-8 chance per second per §4.6).
    pub fn generate(now: Timestamp) -> Self {
        let mut rng = rand::thread_rng();
        Self::generate_with(now, &mut rng)
    }

    fn generate_with<R: Rng + ?Sized>(now: Timestamp, rng: &mut R) -> Self {
        let dt: DateTime = now.to_zoned(jiff::tz::TimeZone::UTC).datetime();
        let second_of_day =
            dt.hour() as u32 * 3600 + dt.minute() as u32 * 60 + dt.second() as u32;

        let mut suffix = [0u8; SUFFIX_LEN];
        for byte in suffix.iter_mut() {
            *byte = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        }

        let formatted = format!(
            "{:04}{:02}{:02}-{:05}-{}",
            dt.year(),
            dt.month(),
            dt.day(),
            second_of_day,
            std::str::from_utf8(&suffix).expect("ALPHABET is ASCII"),
        );
        let mut text = [0u8; 20];
        text.copy_from_slice(formatted.as_bytes());
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.text).expect("VersionId is always ASCII")
    }

    /// Recovers the creation instant to second precision.
    pub fn instant(&self) -> Result<Timestamp, HoardError> {
        parse(self.as_str()).map(|(instant, _)| instant)
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VersionId {
    type Err = HoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)?;
        let mut text = [0u8; 20];
        text.copy_from_slice(s.as_bytes());
        Ok(Self { text })
    }
}

/// Parses `YYYYMMDD-SSSSS-XXXXX` into `(instant, suffix)`.
fn parse(s: &str) -> Result<(Timestamp, &str), HoardError> {
    let malformed = || HoardError::MalformedRow(format!("{s:?} is not a valid version id"));

    if s.len() != 20 {
        return Err(malformed());
    }
    let (date, rest) = s.split_at(8);
    let rest = rest.strip_prefix('-').ok_or_else(malformed)?;
    let (seconds, rest) = rest.split_at(5);
    let suffix = rest.strip_prefix('-').ok_or_else(malformed)?;
    if suffix.len() != SUFFIX_LEN || !suffix.bytes().all(|b| ALPHABET.contains(&b)) {
        return Err(malformed());
    }

    let year: i16 = date[0..4].parse().map_err(|_| malformed())?;
    let month: i8 = date[4..6].parse().map_err(|_| malformed())?;
    let day: i8 = date[6..8].parse().map_err(|_| malformed())?;
    let second_of_day: u32 = seconds.parse().map_err(|_| malformed())?;
    if second_of_day >= 86400 {
        return Err(malformed());
    }

    let hour = (second_of_day / 3600) as i8;
    let minute = ((second_of_day % 3600) / 60) as i8;
    let second = (second_of_day % 60) as i8;

    let dt = DateTime::new(year, month, day, hour, minute, second, 0).map_err(|_| malformed())?;
    let instant = dt
        .to_zoned(jiff::tz::TimeZone::UTC)
        .map_err(|_| malformed())?
        .timestamp();

    Ok((instant, suffix))
}

/// Free function mirroring the distilled spec's `parse_id` naming used in
/// its concrete test scenario.
pub fn parse_id(s: &str) -> Result<Timestamp, HoardError> {
    parse(s).map(|(instant, _)| instant)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parses_concrete_example() {
        // From the distilled spec: 01482 seconds = 04:08:02.
        let instant = parse_id("20201204-01482-abcde").unwrap();
        let dt = instant.to_zoned(jiff::tz::TimeZone::UTC).datetime();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 12, 4));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (4, 8, 2));
    }

    #[test]
    fn rejects_bad_format() {
        assert!(parse_id("not-an-id").is_err());
        assert!(parse_id("20201204-99999-abcde").is_err());
        assert!(parse_id("20201204-01482-ABCDE").is_err());
    }

    #[test]
    fn monotonic_ids_sort_chronologically() {
        let mut rng = StdRng::seed_from_u64(1);
        let t_a = Timestamp::UNIX_EPOCH;
        let t_b = t_a.checked_add(jiff::Span::new().hours(1)).unwrap();

        let a = VersionId::generate_with(t_a, &mut rng);
        let b = VersionId::generate_with(t_b, &mut rng);
        assert!(a < b);
        assert!(a.instant().unwrap() <= b.instant().unwrap());
    }

    #[test]
    fn round_trip_through_display_and_parse() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = VersionId::generate_with(Timestamp::UNIX_EPOCH, &mut rng);
        let text = id.to_string();
        let parsed: VersionId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }
}
