//! Log streams as the backend ingests and returns them.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A labelled, time-ordered sequence of samples.
///
/// The label set identifies the stream on the backend. Samples must be in
/// non-decreasing time order; this is not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(rename = "stream")]
    pub labels: BTreeMap<String, String>,
    pub values: Vec<Sample>,
}

/// One log line. Serialized as `["<unix nanoseconds>", "<line>"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub t: DateTime<Utc>,
    pub v: String,
}

impl Sample {
    pub fn unix_nanos(&self) -> Option<i64> {
        self.t.timestamp_nanos_opt()
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ns = self
            .unix_nanos()
            .ok_or_else(|| S::Error::custom("sample timestamp out of nanosecond range"))?;
        (ns.to_string(), &self.v).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut tuple = Vec::<String>::deserialize(deserializer).map_err(|e| {
            D::Error::custom(format!("failed to deserialize sample in Loki response: {e}"))
        })?;
        if tuple.len() != 2 {
            return Err(D::Error::custom(format!(
                "sample in Loki response had {} fields, but expected 2",
                tuple.len()
            )));
        }

        let ns: i64 = tuple[0].parse().map_err(|e| {
            D::Error::custom(format!(
                "timestamp in Loki sample not convertible to nanosecond epoch: {e}"
            ))
        })?;
        let v = tuple.swap_remove(1);
        Ok(Sample {
            t: Utc.timestamp_nanos(ns),
            v,
        })
    }
}

/// Render labels in Prometheus notation: `{a="1", b="2"}`.
pub fn format_labels(labels: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (k, v)) in labels.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(k);
        out.push_str("=\"");
        for c in v.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                c => out.push(c),
            }
        }
        out.push('"');
    }
    out.push('}');
    out
}
