use std::fmt;

/// Maximum length of an error message surfaced in summaries
const MAX_MESSAGE_LEN: usize = 240;

/// Substrings that indicate a message echoes a raw serialized payload
const SERIALIZATION_MARKERS: &[&str] = &[
    "invalid type:",
    "unknown variant",
    "missing field",
    "expected value at line",
    "cannot unmarshal",
    "trailing characters at line",
];

/// Error types for export operations
#[derive(Debug)]
pub enum ExportError {
    /// The registry is inconsistent with the set of constructible handlers
    Registry(String),

    /// Type name is not present in the registry
    UnknownType(String),

    /// Remote API call failed
    Api {
        type_name: String,
        message: String,
    },

    /// Identifier fields required by the type are missing or empty
    MissingIdentifier {
        type_name: String,
        field: String,
    },

    /// Response could not be mapped onto the canonical structure
    Conversion {
        type_name: String,
        identifiers: String,
        message: String,
    },

    /// Discriminator value has no supported configuration block
    UnsupportedOneOf {
        type_name: String,
        value: String,
    },

    /// Configuration file parsing or validation error
    Config(String),

    /// File system operation failed
    FileSystem(String),

    /// General I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Registry(msg) => {
                write!(f, "Registry inconsistency: {}", msg)
            }
            ExportError::UnknownType(name) => {
                write!(f, "Unknown resource type: {}", name)
            }
            ExportError::Api { type_name, message } => {
                write!(f, "API call for {} failed: {}", type_name, message)
            }
            ExportError::MissingIdentifier { type_name, field } => {
                write!(
                    f,
                    "Missing identifier '{}' required by {}",
                    field, type_name
                )
            }
            ExportError::Conversion {
                type_name,
                identifiers,
                message,
            } => {
                write!(
                    f,
                    "Failed to convert {} [{}]: {}",
                    type_name, identifiers, message
                )
            }
            ExportError::UnsupportedOneOf { type_name, value } => {
                write!(
                    f,
                    "oneOf type unsupported by provider: {} ({})",
                    type_name, value
                )
            }
            ExportError::Config(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            ExportError::FileSystem(msg) => {
                write!(f, "File system error: {}", msg)
            }
            ExportError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            ExportError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<serde_yaml::Error> for ExportError {
    fn from(err: serde_yaml::Error) -> Self {
        ExportError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Why a type or an item produced no output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The type has no list method
    NotListable,
    /// The enumeration call failed
    ListFailed(String),
    /// Enumeration succeeded but returned nothing
    NoIdentifiers,
    /// Listing requires a parent value (e.g. a pack) that is not known yet
    NeedsParentContext(String),
    /// Identifier set lacks a field the identifier format needs
    MissingIdentifier(String),
    /// Get or mapping failed for one identifier set
    ConversionFailed(String),
    /// Discriminator value has no supported block
    UnsupportedOneOf(String),
    /// Matched an explicit deny rule
    Excluded(String),
    /// Identifier looks like a built-in rather than a user-created object
    BuiltIn(String),
}

impl SkipReason {
    /// Whether this skip is informational rather than a failure
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            SkipReason::NotListable
                | SkipReason::NoIdentifiers
                | SkipReason::NeedsParentContext(_)
                | SkipReason::Excluded(_)
                | SkipReason::BuiltIn(_)
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotListable => write!(f, "type has no list method"),
            SkipReason::ListFailed(msg) => write!(f, "list failed: {}", msg),
            SkipReason::NoIdentifiers => write!(f, "no resources found"),
            SkipReason::NeedsParentContext(field) => {
                write!(f, "cannot list without '{}'", field)
            }
            SkipReason::MissingIdentifier(field) => {
                write!(f, "missing identifier '{}'", field)
            }
            SkipReason::ConversionFailed(msg) => {
                write!(f, "conversion failed: {}", msg)
            }
            SkipReason::UnsupportedOneOf(value) => {
                write!(f, "oneOf type unsupported by provider: {}", value)
            }
            SkipReason::Excluded(rule) => write!(f, "excluded: {}", rule),
            SkipReason::BuiltIn(why) => write!(f, "built-in object: {}", why),
        }
    }
}

impl From<&ExportError> for SkipReason {
    fn from(err: &ExportError) -> Self {
        match err {
            ExportError::UnsupportedOneOf { value, .. } => {
                SkipReason::UnsupportedOneOf(value.clone())
            }
            ExportError::MissingIdentifier { field, .. } => {
                SkipReason::MissingIdentifier(field.clone())
            }
            other => SkipReason::ConversionFailed(sanitize_message(&other.to_string())),
        }
    }
}

/// Make an error message safe to surface in a summary.
///
/// Messages that echo serializer output may contain raw payload data, so they
/// are replaced wholesale. Everything else is capped in length.
pub fn sanitize_message(message: &str) -> String {
    let lowered = message.to_lowercase();

    if SERIALIZATION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return "unsupported type".to_string();
    }

    if message.chars().count() <= MAX_MESSAGE_LEN {
        return message.to_string();
    }

    let truncated: String = message.chars().take(MAX_MESSAGE_LEN).collect();
    format!("{}...", truncated)
}
