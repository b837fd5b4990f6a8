use std::fmt;

use serde::{Serialize, Serializer};

/// Machine-readable error codes surfaced by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    SnapshotUnreadable,
    MalformedEntity,
    StaleReference,
    StaleResponse,
    NoActiveUtub,
    FetchFailed,
    FetchUnauthorized,
    FetchNotFound,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::SnapshotUnreadable => "E1002",
            Self::MalformedEntity => "E2001",
            Self::StaleReference => "E2002",
            Self::StaleResponse => "E2003",
            Self::NoActiveUtub => "E2004",
            Self::FetchFailed => "E4001",
            Self::FetchUnauthorized => "E4002",
            Self::FetchNotFound => "E4003",
            Self::InternalUnexpected => "E9001",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::SnapshotUnreadable => "Snapshot file could not be read",
            Self::MalformedEntity => "Entity is missing a required field",
            Self::StaleReference => "Element already removed",
            Self::StaleResponse => "Response superseded by a newer refresh",
            Self::NoActiveUtub => "No UTub is selected",
            Self::FetchFailed => "Request to the UTubs server failed",
            Self::FetchUnauthorized => "Not signed in to the UTubs server",
            Self::FetchNotFound => "UTub not found or not shared with you",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for terminal output.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in utub/config.toml and retry."),
            Self::SnapshotUnreadable => {
                Some("Pass a JSON file holding one UTub snapshot or an array of snapshots.")
            }
            Self::MalformedEntity | Self::StaleReference | Self::StaleResponse => None,
            Self::NoActiveUtub => Some("Select a UTub before refreshing."),
            Self::FetchFailed => Some("Check the server URL (`--server` or UTUB_SERVER) and retry."),
            Self::FetchUnauthorized => Some("Set `csrf_token` under [server] or sign in again."),
            Self::FetchNotFound => Some("List your UTubs with `utub show` and pick a listed id."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Map an HTTP status from the server to the closest code.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::FetchUnauthorized,
            404 => Self::FetchNotFound,
            _ => Self::FetchFailed,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 10] = [
        ErrorCode::ConfigParseError,
        ErrorCode::SnapshotUnreadable,
        ErrorCode::MalformedEntity,
        ErrorCode::StaleReference,
        ErrorCode::StaleResponse,
        ErrorCode::NoActiveUtub,
        ErrorCode::FetchFailed,
        ErrorCode::FetchUnauthorized,
        ErrorCode::FetchNotFound,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn http_statuses_map_to_fetch_codes() {
        assert_eq!(ErrorCode::from_http_status(403), ErrorCode::FetchUnauthorized);
        assert_eq!(ErrorCode::from_http_status(404), ErrorCode::FetchNotFound);
        assert_eq!(ErrorCode::from_http_status(500), ErrorCode::FetchFailed);
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&ErrorCode::StaleResponse).expect("serialize");
        assert_eq!(json, "\"E2003\"");
    }
}
