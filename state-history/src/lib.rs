//! Evaluation-history shipping to a Loki-compatible log backend.
//!
//! * [`stream`] — the stream/sample model and its JSON wire form.
//! * [`encoder`] — pluggable push-body encodings (snappy protobuf, JSON).
//! * [`loki`] — push, range query and ping against the backend.
//! * [`historian`] — turns rule evaluation records into streams, best-effort.

pub mod encoder;
pub mod error;
pub mod historian;
pub mod loki;
pub mod metrics;
pub mod stream;

pub use encoder::{Encoder, EncoderKind, JsonEncoder, SnappyProtoEncoder};
pub use error::{Error, Result};
pub use historian::{
    Entry, EvaluationStatus, GroupKey, Historian, HistorianConfig, Record, HISTORY_WRITE_TIMEOUT,
};
pub use loki::{clamp_limit, clamp_range, LokiClient, LokiConfig, QueryRes};
pub use metrics::HistoryMetrics;
pub use stream::{Sample, Stream};
