//! Decoding of raw request bodies into [`Point`]s.
//!
//! The gateway treats decoding as a pluggable capability so that the wire
//! format stays out of the serving core; [`LpDecoder`] is the shipped
//! implementation, backed by the `influxdb-line-protocol` parser.

use crate::point::Point;
use crate::precision::Precision;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input contained no lines at all. This is the clean
    /// "nothing to ingest" condition, not a malformed payload.
    #[error("EOF")]
    EndOfInput,

    #[error("{0}")]
    Malformed(#[from] influxdb_line_protocol::Error),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Turns a request body into points.
///
/// `default_time_ns` is the reference timestamp (nanoseconds) assigned to
/// lines that carry no timestamp of their own; `precision` scales the
/// timestamps that are present.
pub trait PointDecoder: Debug + Send + Sync + 'static {
    fn decode(
        &self,
        input: &str,
        default_time_ns: i64,
        precision: Precision,
    ) -> Result<Vec<Point>>;
}

/// The line protocol decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct LpDecoder;

impl LpDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PointDecoder for LpDecoder {
    fn decode(
        &self,
        input: &str,
        default_time_ns: i64,
        precision: Precision,
    ) -> Result<Vec<Point>> {
        let mut points = Vec::new();
        for line in influxdb_line_protocol::parse_lines(input) {
            points.push(Point::from_parsed_line(line?, default_time_ns, precision));
        }

        if points.is_empty() {
            return Err(DecodeError::EndOfInput);
        }

        Ok(points)
    }
}
