//! Protobuf messages for the log backend's push protocol.
//!
//! Only the subset needed to write streams is declared here. Field tags match
//! `logproto` so the encoded bytes are accepted by the backend's
//! `/loki/api/v1/push` endpoint.

/// Top-level body of a push request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub streams: ::prost::alloc::vec::Vec<StreamAdapter>,
}

/// A labelled stream of entries.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamAdapter {
    /// Prometheus-style label string, e.g. `{from="evaluation-history", orgID="1"}`.
    #[prost(string, tag = "1")]
    pub labels: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub entries: ::prost::alloc::vec::Vec<EntryAdapter>,
    /// Left at zero; the backend computes its own hash.
    #[prost(uint64, tag = "3")]
    pub hash: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntryAdapter {
    #[prost(message, optional, tag = "1")]
    pub timestamp: ::core::option::Option<Timestamp>,
    #[prost(string, tag = "2")]
    pub line: ::prost::alloc::string::String,
}

/// Wire-compatible with `google.protobuf.Timestamp`.
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

impl Timestamp {
    /// Split a nanosecond Unix epoch into seconds and a non-negative nanosecond remainder.
    pub fn from_unix_nanos(ns: i64) -> Self {
        Self {
            seconds: ns.div_euclid(1_000_000_000),
            nanos: ns.rem_euclid(1_000_000_000) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn timestamp_splits_positive_nanos() {
        let ts = Timestamp::from_unix_nanos(1_700_000_000_123_456_789);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
    }

    #[test]
    fn timestamp_keeps_nanos_non_negative() {
        let ts = Timestamp::from_unix_nanos(-1);
        assert_eq!(ts.seconds, -1);
        assert_eq!(ts.nanos, 999_999_999);
    }

    #[test]
    fn push_request_decodes_what_it_encodes() {
        let req = PushRequest {
            streams: vec![StreamAdapter {
                labels: r#"{job="test"}"#.to_string(),
                entries: vec![EntryAdapter {
                    timestamp: Some(Timestamp::from_unix_nanos(1234)),
                    line: "hello".to_string(),
                }],
                hash: 0,
            }],
        };
        let bytes = req.encode_to_vec();
        assert_eq!(PushRequest::decode(bytes.as_slice()).unwrap(), req);
    }

    #[test]
    fn empty_push_request_encodes_to_nothing() {
        assert!(PushRequest::default().encode_to_vec().is_empty());
    }
}
