//! Parsed trace records and their validation
//!
//! The parser hands over untyped records: any field may be missing and the
//! point count is still text. [`TraceRecord::validate`] turns one into a typed
//! [`TraceEvent`] or a [`RecordError`] that the caller drops.

use thiserror::Error;

/// A burst block as read from the trace, fields not yet checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurstRecord {
    pub identity: Option<String>,
    pub message_id: Option<String>,
    pub points: Option<String>,
    /// Wire size from the `received N bytes` header, informational only
    pub bytes: Option<u64>,
}

/// An ack block as read from the trace, fields not yet checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckRecord {
    pub identity: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    Burst(BurstRecord),
    Ack(AckRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstEvent {
    pub identity: String,
    pub message_id: String,
    pub point_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEvent {
    pub identity: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Burst(BurstEvent),
    Ack(AckEvent),
}

/// Why a record was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed {kind} record: missing '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("malformed burst record: point count '{0}' is not a non-negative integer")]
    InvalidPointCount(String),
}

impl TraceRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            TraceRecord::Burst(_) => "burst",
            TraceRecord::Ack(_) => "ack",
        }
    }

    pub fn validate(&self) -> Result<TraceEvent, RecordError> {
        let kind = self.kind();
        match self {
            TraceRecord::Burst(burst) => {
                let identity = required(kind, "identity", &burst.identity)?;
                let message_id = required(kind, "message id", &burst.message_id)?;
                let points = required(kind, "points", &burst.points)?;
                let point_count = points
                    .parse::<u64>()
                    .map_err(|_| RecordError::InvalidPointCount(points.clone()))?;

                Ok(TraceEvent::Burst(BurstEvent {
                    identity,
                    message_id,
                    point_count,
                }))
            }
            TraceRecord::Ack(ack) => {
                let identity = required(kind, "identity", &ack.identity)?;
                let message_id = required(kind, "message id", &ack.message_id)?;

                Ok(TraceEvent::Ack(AckEvent {
                    identity,
                    message_id,
                }))
            }
        }
    }
}

/// Present and non-blank, trimmed
fn required(
    kind: &'static str,
    field: &'static str,
    value: &Option<String>,
) -> Result<String, RecordError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(RecordError::MissingField { kind, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst(identity: Option<&str>, message_id: Option<&str>, points: Option<&str>) -> TraceRecord {
        TraceRecord::Burst(BurstRecord {
            identity: identity.map(String::from),
            message_id: message_id.map(String::from),
            points: points.map(String::from),
            bytes: None,
        })
    }

    #[test]
    fn test_valid_burst() {
        let record = burst(Some("0x00e43c9877"), Some("0xf394"), Some("405"));

        assert_eq!(
            record.validate().unwrap(),
            TraceEvent::Burst(BurstEvent {
                identity: "0x00e43c9877".to_string(),
                message_id: "0xf394".to_string(),
                point_count: 405,
            })
        );
    }

    #[test]
    fn test_missing_points() {
        let record = burst(Some("A"), Some("1"), None);

        assert_eq!(
            record.validate().unwrap_err(),
            RecordError::MissingField {
                kind: "burst",
                field: "points"
            }
        );
    }

    #[test]
    fn test_non_numeric_points() {
        for bad in ["lots", "-5", "4.2"] {
            let record = burst(Some("A"), Some("1"), Some(bad));
            assert_eq!(
                record.validate().unwrap_err(),
                RecordError::InvalidPointCount(bad.to_string())
            );
        }
    }

    #[test]
    fn test_blank_identity_is_missing() {
        let record = TraceRecord::Ack(AckRecord {
            identity: Some("   ".to_string()),
            message_id: Some("0xeb9a".to_string()),
        });

        assert_eq!(
            record.validate().unwrap_err(),
            RecordError::MissingField {
                kind: "ack",
                field: "identity"
            }
        );
    }

    #[test]
    fn test_error_message() {
        let err = RecordError::MissingField {
            kind: "ack",
            field: "message id",
        };
        assert_eq!(err.to_string(), "malformed ack record: missing 'message id'");
    }
}
