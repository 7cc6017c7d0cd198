//! The owned representation of a single parsed measurement sample.

use crate::precision::Precision;
use influxdb_line_protocol::ParsedLine;

/// One time-series sample: a measurement name, its tag set, its field set,
/// and a timestamp resolved to nanoseconds.
///
/// The gateway never looks inside a `Point`; it only counts points and hands
/// batches of them to the consumer resolved for the request's database.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    /// Tag key/value pairs in the order they appeared on the line.
    pub tags: Vec<(String, String)>,
    /// Field key/value pairs in the order they appeared on the line.
    pub fields: Vec<(String, FieldValue)>,
    /// Nanoseconds since the Unix epoch.
    pub time_ns: i64,
}

/// Allowed field types, mirroring the line protocol data types.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Boolean(bool),
    String(String),
}

impl From<&influxdb_line_protocol::FieldValue<'_>> for FieldValue {
    fn from(value: &influxdb_line_protocol::FieldValue<'_>) -> Self {
        use influxdb_line_protocol::FieldValue as Lp;
        match value {
            Lp::I64(v) => Self::I64(*v),
            Lp::U64(v) => Self::U64(*v),
            Lp::F64(v) => Self::F64(*v),
            Lp::Boolean(v) => Self::Boolean(*v),
            Lp::String(v) => Self::String(v.to_string()),
        }
    }
}

impl Point {
    /// Convert a borrowed [`ParsedLine`] into an owned `Point`, scaling an
    /// explicit timestamp by `precision` and falling back to
    /// `default_time_ns` when the line carries none.
    pub fn from_parsed_line(
        line: ParsedLine<'_>,
        default_time_ns: i64,
        precision: Precision,
    ) -> Self {
        let measurement = line.series.measurement.to_string();
        let tags = line
            .series
            .tag_set
            .map(|tags| {
                tags.into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let fields = line
            .field_set
            .into_iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(&v)))
            .collect();
        let time_ns = line
            .timestamp
            .map(|ts| precision.to_nanos(ts))
            .unwrap_or(default_time_ns);

        Self {
            measurement,
            tags,
            fields,
            time_ns,
        }
    }
}
