//! `get_time` tool (§4.5 tool mapping table).

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetTimeRequest {
    /// IANA-style hint is accepted but only UTC is actually produced; any
    /// value other than "utc"/absent is rejected rather than silently
    /// ignored, so callers don't mistake this for real timezone support.
    #[serde(default)]
    pub timezone: Option<String>,
}

pub fn get_time(req: GetTimeRequest) -> Result<Value, String> {
    if let Some(tz) = &req.timezone {
        if !tz.eq_ignore_ascii_case("utc") {
            return Err(format!("unsupported timezone '{tz}'; only utc is available"));
        }
    }
    let now = chrono::Utc::now();
    Ok(serde_json::json!({
        "iso8601": now.to_rfc3339(),
        "unix_seconds": now.timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_returns_utc_time() {
        let result = get_time(GetTimeRequest::default()).unwrap();
        assert!(result["iso8601"].as_str().unwrap().contains('T'));
        assert!(result["unix_seconds"].as_i64().unwrap() > 0);
    }

    #[test]
    fn unsupported_timezone_is_rejected() {
        let err = get_time(GetTimeRequest { timezone: Some("America/New_York".into()) }).unwrap_err();
        assert!(err.contains("unsupported timezone"));
    }
}
