//! COSEM date-time (Blue Book 4.1.6.1), the 12-byte octet-string used by clocks.
//!
//! ```text
//! year(2) month day_of_month day_of_week hour minute second hundredths deviation(2) status
//! ```
//!
//! Multi-byte fields are big-endian. `0xFF` marks an absent single-byte time field or
//! clock status and `0x8000` an absent deviation.

use core::fmt;

use nom::{IResult, Parser, bytes::streaming::take};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

const NOT_SPECIFIED: u8 = 0xff;
const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day_of_month: u8,
    pub day_of_week: u8,
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day_of_month)
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date(\"{}\", day_of_week={})", self, self.day_of_week)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub hundredths: Option<u8>,
}

impl Time {
    pub const NOT_SPECIFIED: Self = Self { hour: None, minute: None, second: None, hundredths: None };
}

struct TimePart(Option<u8>);

impl fmt::Display for TimePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:02}", v),
            None => f.write_str("--"),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}.{}",
            TimePart(self.hour),
            TimePart(self.minute),
            TimePart(self.second),
            TimePart(self.hundredths),
        )
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time(\"{}\")", self)
    }
}

/// Clock status byte. Reserved bits are kept so the byte re-encodes unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockStatus(pub u8);

impl ClockStatus {
    #[rustfmt::skip]
    const INVALID_VALUE_BIT:        u8 = 0b0000_0001;
    #[rustfmt::skip]
    const DOUBTFUL_VALUE_BIT:       u8 = 0b0000_0010;
    #[rustfmt::skip]
    const DIFFERENT_CLOCK_BASE_BIT: u8 = 0b0000_0100;
    #[rustfmt::skip]
    const INVALID_CLOCK_STATUS_BIT: u8 = 0b0000_1000;
    #[rustfmt::skip]
    const RESERVED_BITS:            u8 = 0b0111_0000;
    #[rustfmt::skip]
    const DAYLIGHT_SAVING_BIT:      u8 = 0b1000_0000;

    pub fn invalid_value(&self) -> bool {
        (self.0 & Self::INVALID_VALUE_BIT) != 0
    }

    pub fn doubtful_value(&self) -> bool {
        (self.0 & Self::DOUBTFUL_VALUE_BIT) != 0
    }

    pub fn different_clock_base(&self) -> bool {
        (self.0 & Self::DIFFERENT_CLOCK_BASE_BIT) != 0
    }

    pub fn invalid_clock_status(&self) -> bool {
        (self.0 & Self::INVALID_CLOCK_STATUS_BIT) != 0
    }

    /// The three reserved bits, shifted down to `0..=7`.
    pub fn reserved(&self) -> u8 {
        (self.0 & Self::RESERVED_BITS) >> 4
    }

    pub fn daylight_saving_active(&self) -> bool {
        (self.0 & Self::DAYLIGHT_SAVING_BIT) != 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemDateTime {
    pub date: Date,
    pub time: Time,
    /// Minutes of local time to UTC, `-720..=720`.
    pub deviation: Option<i16>,
    pub clock_status: Option<ClockStatus>,
}

impl CosemDateTime {
    pub const LEN: usize = 12;

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, bytes) = take(Self::LEN).parse(input)?;
        let mut raw = [0; Self::LEN];
        raw.copy_from_slice(bytes);
        Ok((input, Self::decode(&raw)))
    }

    /// Decodes the fixed layout. Every byte pattern is accepted.
    pub fn decode(bytes: &[u8; Self::LEN]) -> Self {
        let optional = |b: u8| Some(b).filter(|&b| b != NOT_SPECIFIED);

        let date = Date {
            year: u16::from_be_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day_of_month: bytes[3],
            day_of_week: bytes[4],
        };
        let time = Time {
            hour: optional(bytes[5]),
            minute: optional(bytes[6]),
            second: optional(bytes[7]),
            hundredths: optional(bytes[8]),
        };
        let deviation = Some(i16::from_be_bytes([bytes[9], bytes[10]]))
            .filter(|&d| d != DEVIATION_NOT_SPECIFIED);
        let clock_status = optional(bytes[11]).map(ClockStatus);

        Self { date, time, deviation, clock_status }
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let optional = |v: Option<u8>| v.unwrap_or(NOT_SPECIFIED);

        let [year_hi, year_lo] = self.date.year.to_be_bytes();
        let [dev_hi, dev_lo] = self.deviation.unwrap_or(DEVIATION_NOT_SPECIFIED).to_be_bytes();
        [
            year_hi,
            year_lo,
            self.date.month,
            self.date.day_of_month,
            self.date.day_of_week,
            optional(self.time.hour),
            optional(self.time.minute),
            optional(self.time.second),
            optional(self.time.hundredths),
            dev_hi,
            dev_lo,
            optional(self.clock_status.map(|status| status.0)),
        ]
    }

    /// Converts to a calendar instant.
    ///
    /// The stored deviation counts minutes from local time to UTC, so it is negated to
    /// obtain the UTC offset. Missing hour, minute or second yields `None`; missing
    /// hundredths or deviation default to zero.
    #[cfg(feature = "chrono")]
    pub fn to_chrono(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        use chrono::{FixedOffset, NaiveDate, TimeZone};

        let date = NaiveDate::from_ymd_opt(
            i32::from(self.date.year),
            u32::from(self.date.month),
            u32::from(self.date.day_of_month),
        )?;
        let time = date.and_hms_milli_opt(
            u32::from(self.time.hour?),
            u32::from(self.time.minute?),
            u32::from(self.time.second?),
            u32::from(self.time.hundredths.unwrap_or(0)) * 10,
        )?;
        let offset_seconds = -i32::from(self.deviation.unwrap_or(0)) * 60;
        let offset = FixedOffset::east_opt(offset_seconds)?;
        offset.from_local_datetime(&time).single()
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)?;

        if let Some(deviation) = self.deviation {
            let sign = if deviation > 0 { '-' } else { '+' };
            let minutes = deviation.unsigned_abs();
            write!(f, "{}{:02}:{:02}", sign, minutes / 60, minutes % 60)?;
        }

        Ok(())
    }
}

impl fmt::Debug for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CosemDateTime(\"{}\"", self)?;
        if let Some(status) = self.clock_status {
            write!(f, ", status=0x{:02x}", status.0)?;
        }
        f.write_str(")")
    }
}

#[cfg(feature = "serde")]
impl Serialize for CosemDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_all_time_fields_absent() {
        let bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0xff, 0xff, 0xff, 0xff, 0x80, 0x00, 0xff];
        let dt = CosemDateTime::decode(&bytes);

        assert_eq!(dt.date, Date { year: 2023, month: 5, day_of_month: 8, day_of_week: 1 });
        assert_eq!(dt.time, Time::NOT_SPECIFIED);
        assert_eq!(dt.deviation, None);
        assert_eq!(dt.clock_status, None);
        assert_eq!(dt.encode(), bytes);
    }

    #[test]
    fn test_decode_meter_clock() {
        // Clock value pushed by an Aidon 6515 in list 3.
        let bytes = [0x07, 0xe3, 0x02, 0x1a, 0x02, 0x0f, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00];
        let dt = CosemDateTime::decode(&bytes);

        assert_eq!(dt.date.year, 2019);
        assert_eq!(dt.date.month, 2);
        assert_eq!(dt.date.day_of_month, 26);
        assert_eq!(dt.date.day_of_week, 2);
        assert_eq!(dt.time.hour, Some(15));
        assert_eq!(dt.time.minute, Some(0));
        assert_eq!(dt.time.second, Some(0));
        assert_eq!(dt.time.hundredths, None);
        assert_eq!(dt.deviation, Some(0));
        assert_eq!(dt.clock_status, Some(ClockStatus(0)));
    }

    #[test]
    fn test_clock_status_daylight_saving() {
        let status = ClockStatus(0x80);
        assert!(status.daylight_saving_active());
        assert!(!status.invalid_value());
        assert!(!status.doubtful_value());
        assert!(!status.different_clock_base());
        assert!(!status.invalid_clock_status());
        assert_eq!(status.reserved(), 0);
    }

    #[test]
    fn test_clock_status_low_bits() {
        let status = ClockStatus(0b0000_1111);
        assert!(status.invalid_value());
        assert!(status.doubtful_value());
        assert!(status.different_clock_base());
        assert!(status.invalid_clock_status());
        assert!(!status.daylight_saving_active());
    }

    #[test]
    fn test_clock_status_reserved_bits_round_trip() {
        let mut bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0x0c, 0x00, 0x00, 0xff, 0x80, 0x00, 0x00];
        bytes[11] = 0b0101_0000;
        let dt = CosemDateTime::decode(&bytes);

        assert_eq!(dt.clock_status.unwrap().reserved(), 0b101);
        assert_eq!(dt.encode(), bytes);
    }

    #[test]
    fn test_parse_consumes_twelve_bytes() {
        let input = [0x07, 0xe7, 0x05, 0x08, 0x01, 0x0c, 0x00, 0x00, 0xff, 0x80, 0x00, 0xff, 0x02];
        let (rest, dt) = CosemDateTime::parse(&input).unwrap();

        assert_eq!(rest, &[0x02]);
        assert_eq!(dt.time.hour, Some(12));
    }

    #[test]
    fn test_parse_short_input() {
        let input = [0x07, 0xe7, 0x05];
        assert!(matches!(CosemDateTime::parse(&input), Err(nom::Err::Incomplete(_))));
    }

    #[test]
    fn test_display() {
        let bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0x0c, 0x00, 0x00, 0xff, 0xff, 0x88, 0x80];
        let dt = CosemDateTime::decode(&bytes);

        // Deviation -120 minutes: local time is two hours ahead of UTC.
        assert_eq!(dt.deviation, Some(-120));
        assert_eq!(dt.to_string(), "2023-05-08T12:00:00.--+02:00");

        let bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0xff, 0xff, 0xff, 0xff, 0x80, 0x00, 0xff];
        assert_eq!(CosemDateTime::decode(&bytes).to_string(), "2023-05-08T--:--:--.--");
    }

    #[test]
    #[cfg(feature = "chrono")]
    fn test_to_chrono_negates_deviation() {
        let bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0x0c, 0x00, 0x00, 0x00, 0xff, 0x88, 0x80];
        let dt = CosemDateTime::decode(&bytes).to_chrono().unwrap();

        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(dt.to_rfc3339(), "2023-05-08T12:00:00+02:00");
    }

    #[test]
    #[cfg(feature = "chrono")]
    fn test_to_chrono_missing_time() {
        let bytes = [0x07, 0xe7, 0x05, 0x08, 0x01, 0xff, 0xff, 0xff, 0xff, 0x80, 0x00, 0xff];
        assert!(CosemDateTime::decode(&bytes).to_chrono().is_none());
    }

    fn optional_byte() -> impl Strategy<Value = Option<u8>> {
        proptest::option::of(0u8..NOT_SPECIFIED)
    }

    prop_compose! {
        fn cosem_date_time()(
            year in any::<u16>(),
            month in any::<u8>(),
            day_of_month in any::<u8>(),
            day_of_week in any::<u8>(),
            hour in optional_byte(),
            minute in optional_byte(),
            second in optional_byte(),
            hundredths in optional_byte(),
            deviation in proptest::option::of(-720i16..=720),
            clock_status in optional_byte(),
        ) -> CosemDateTime {
            CosemDateTime {
                date: Date { year, month, day_of_month, day_of_week },
                time: Time { hour, minute, second, hundredths },
                deviation,
                clock_status: clock_status.map(ClockStatus),
            }
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(dt in cosem_date_time()) {
            prop_assert_eq!(CosemDateTime::decode(&dt.encode()), dt);
        }

        #[test]
        fn prop_decode_is_total(bytes in any::<[u8; 12]>()) {
            let dt = CosemDateTime::decode(&bytes);
            prop_assert_eq!(dt.encode(), bytes);
        }
    }
}
