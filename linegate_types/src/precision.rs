//! Time precision for incoming write requests.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The unit used to interpret explicit timestamps in a write request.
///
/// The query-parameter spellings follow the v1 write API: `n`, `u`, `ms`,
/// and `s`. Values that carry no timestamp are assigned the server's
/// reference time, which is always in nanoseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    #[default]
    #[serde(rename = "n", alias = "ns")]
    Nanosecond,
    #[serde(rename = "u", alias = "us")]
    Microsecond,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "s")]
    Second,
}

impl Precision {
    /// The query-parameter spelling of this precision.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Nanosecond => "n",
            Self::Microsecond => "u",
            Self::Millisecond => "ms",
            Self::Second => "s",
        }
    }

    /// Scale a timestamp expressed in this precision to nanoseconds.
    pub fn to_nanos(&self, ts: i64) -> i64 {
        let multiplier = match self {
            Self::Nanosecond => 1,
            Self::Microsecond => 1_000,
            Self::Millisecond => 1_000_000,
            Self::Second => 1_000_000_000,
        };

        ts * multiplier
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" | "ns" => Ok(Self::Nanosecond),
            "u" | "us" => Ok(Self::Microsecond),
            "ms" => Ok(Self::Millisecond),
            "s" => Ok(Self::Second),
            _ => Err(format!(
                "invalid precision '{s}', expected one of: n, u, ms, s"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scales_to_nanoseconds() {
        assert_eq!(Precision::Nanosecond.to_nanos(1_708_976_567_000_000_000), 1_708_976_567_000_000_000);
        assert_eq!(Precision::Microsecond.to_nanos(1_708_976_567_000_000), 1_708_976_567_000_000_000);
        assert_eq!(Precision::Millisecond.to_nanos(1_708_976_567_000), 1_708_976_567_000_000_000);
        assert_eq!(Precision::Second.to_nanos(1_708_976_567), 1_708_976_567_000_000_000);
    }

    #[test]
    fn parses_query_param_spellings() {
        #[derive(Debug, Deserialize)]
        struct Params {
            precision: Precision,
        }

        for (arg, expected) in [
            ("n", Precision::Nanosecond),
            ("ns", Precision::Nanosecond),
            ("u", Precision::Microsecond),
            ("us", Precision::Microsecond),
            ("ms", Precision::Millisecond),
            ("s", Precision::Second),
        ] {
            let params: Params =
                serde_urlencoded::from_str(&format!("precision={arg}")).unwrap();
            assert_eq!(params.precision, expected, "precision arg {arg}");
        }

        assert!(serde_urlencoded::from_str::<Params>("precision=h").is_err());
    }

    #[test]
    fn round_trips_from_str() {
        for p in [
            Precision::Nanosecond,
            Precision::Microsecond,
            Precision::Millisecond,
            Precision::Second,
        ] {
            assert_eq!(p.as_arg().parse::<Precision>().unwrap(), p);
        }
    }
}
