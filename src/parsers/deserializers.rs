use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Convert the remote's fractional epoch seconds (e.g. `1700000000.123456`)
/// to a UTC timestamp. Returns `None` for non-finite or out-of-range values.
pub fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
    DateTime::from_timestamp(whole, nanos.min(999_999_999))
}

/// Validate a conversation id (the service issues UUIDs).
pub fn validate_conversation_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("conversation id cannot be empty".to_string());
    }
    Uuid::parse_str(id).map_err(|e| format!("invalid UUID format for conversation id: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(
            epoch_to_datetime(1_700_000_000.0).unwrap(),
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
    }

    #[test]
    fn test_fractional_epoch_keeps_subseconds() {
        let ts = epoch_to_datetime(1_700_000_000.5).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(epoch_to_datetime(f64::NAN).is_none());
        assert!(epoch_to_datetime(f64::INFINITY).is_none());
    }

    #[test]
    fn test_validate_conversation_id() {
        assert!(validate_conversation_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_conversation_id("").is_err());
        assert!(validate_conversation_id("not-a-uuid").is_err());
    }
}
