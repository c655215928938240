//! Push-body encodings.

use std::str::FromStr;

use prost::Message;
use proto::{EntryAdapter, PushRequest, StreamAdapter, Timestamp};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::stream::{format_labels, Stream};

/// Turns streams into a push request body.
///
/// `headers` describes the body to the backend; the client attaches them to
/// every push.
pub trait Encoder: Send + Sync {
    fn encode(&self, streams: &[Stream]) -> Result<Vec<u8>>;
    fn headers(&self) -> &'static [(&'static str, &'static str)];
}

/// Which encoder a client is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncoderKind {
    #[default]
    SnappyProto,
    Json,
}

impl EncoderKind {
    pub fn build(self) -> Box<dyn Encoder> {
        match self {
            EncoderKind::SnappyProto => Box::new(SnappyProtoEncoder),
            EncoderKind::Json => Box::new(JsonEncoder),
        }
    }
}

impl FromStr for EncoderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snappy" | "snappy-proto" | "protobuf" => Ok(EncoderKind::SnappyProto),
            "json" => Ok(EncoderKind::Json),
            other => Err(format!("unknown encoder {other:?}, expected \"snappy\" or \"json\"")),
        }
    }
}

// ------------------------------------------------------------------ //
//  JSON                                                               //
// ------------------------------------------------------------------ //

/// Plain JSON: `{"streams": [{"stream": {...}, "values": [[ts, line], ...]}]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[derive(Serialize)]
struct PushBody<'a> {
    streams: &'a [Stream],
}

impl Encoder for JsonEncoder {
    fn encode(&self, streams: &[Stream]) -> Result<Vec<u8>> {
        serde_json::to_vec(&PushBody { streams }).map_err(Error::Encode)
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[("Content-Type", "application/json")]
    }
}

// ------------------------------------------------------------------ //
//  Snappy-compressed protobuf                                         //
// ------------------------------------------------------------------ //

/// The backend's native push format: a protobuf `PushRequest`, snappy
/// block-compressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnappyProtoEncoder;

impl Encoder for SnappyProtoEncoder {
    fn encode(&self, streams: &[Stream]) -> Result<Vec<u8>> {
        let req = PushRequest {
            streams: streams.iter().map(to_adapter).collect::<Result<_>>()?,
        };
        let raw = req.encode_to_vec();
        Ok(snap::raw::Encoder::new().compress_vec(&raw)?)
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("Content-Type", "application/x-protobuf"),
            ("Content-Encoding", "snappy"),
        ]
    }
}

fn to_adapter(stream: &Stream) -> Result<StreamAdapter> {
    let entries = stream
        .values
        .iter()
        .map(|sample| -> Result<EntryAdapter> {
            let ns = sample
                .unix_nanos()
                .ok_or(Error::TimestampOutOfRange(sample.t))?;
            Ok(EntryAdapter {
                timestamp: Some(Timestamp::from_unix_nanos(ns)),
                line: sample.v.clone(),
            })
        })
        .collect::<Result<_>>()?;

    Ok(StreamAdapter {
        labels: format_labels(&stream.labels),
        entries,
        hash: 0,
    })
}
