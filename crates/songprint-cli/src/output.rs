//! JSON output formatting
//!
//! Everything the tools print on stdout is a single JSON document: either the
//! result or an error payload.

use serde::Serialize;
use songprint_core::SongprintError;

/// Structured failure payload
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    pub kind: String,
}

impl From<&SongprintError> for ErrorPayload {
    fn from(e: &SongprintError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}

impl From<&anyhow::Error> for ErrorPayload {
    fn from(e: &anyhow::Error) -> Self {
        let kind = e
            .downcast_ref::<SongprintError>()
            .map(|se| se.kind())
            .unwrap_or("InternalError");
        Self {
            error: format!("{:#}", e),
            kind: kind.to_string(),
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing result: {}", e),
    }
}

/// Print an error payload and exit with status 1
pub fn exit_with_error(payload: ErrorPayload) -> ! {
    log::error!("{} ({})", payload.error, payload.kind);
    print_json(&payload);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_songprint_error() {
        let err = SongprintError::CatalogRead("mfcc is empty".into());
        let json = serde_json::to_value(ErrorPayload::from(&err)).unwrap();
        assert_eq!(json["kind"], "CatalogReadError");
        assert_eq!(json["error"], "catalog read error: mfcc is empty");
    }

    #[test]
    fn test_payload_from_wrapped_error() {
        let err = anyhow::Error::new(SongprintError::Store("disk full".into()))
            .context("migrating entry 3");
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.kind, "StoreError");
        assert!(payload.error.starts_with("migrating entry 3: "));

        let plain = anyhow::anyhow!("boom");
        assert_eq!(ErrorPayload::from(&plain).kind, "InternalError");
    }
}
