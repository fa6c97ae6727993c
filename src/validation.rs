//! Input validation for values that arrive over the radio or from the config file.

/// Validation errors with messages suitable for replying over the mesh.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Instance name is empty")]
    EmptyInstance,

    #[error("Instance name is too long (maximum {max} characters)")]
    InstanceTooLong { max: usize },

    #[error("Instance name contains invalid characters: {chars}")]
    InvalidInstanceCharacters { chars: String },

    #[error("Instance name is not a host name")]
    MalformedInstance,

    #[error("Command prefix must be a single punctuation character, got {0:?}")]
    InvalidPrefix(String),

    #[error("Command name must be a single non-empty word, got {0:?}")]
    InvalidCommandName(String),

    #[error("Authorization code is empty")]
    EmptyCode,

    #[error("Post is too long (maximum {max} characters)")]
    PostTooLong { max: usize },
}

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Default Mastodon status length limit.
pub const MAX_POST_CHARS: usize = 500;

/// Normalize and validate a Mastodon instance given as `host`, `https://host` or
/// `host/`. Returns the bare lowercase host (with optional `:port`).
pub fn validate_instance(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme.trim_end_matches('/').to_ascii_lowercase();

    if host.is_empty() {
        return Err(InputError::EmptyInstance);
    }
    if host.len() > MAX_HOST_LEN {
        return Err(InputError::InstanceTooLong { max: MAX_HOST_LEN });
    }

    let invalid: String = host
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':')))
        .collect();
    if !invalid.is_empty() {
        return Err(InputError::InvalidInstanceCharacters { chars: invalid });
    }

    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host.as_str(), None),
    };
    if let Some(port) = port {
        if port.parse::<u16>().map(|p| p == 0).unwrap_or(true) {
            return Err(InputError::MalformedInstance);
        }
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(InputError::MalformedInstance);
    }
    for label in labels {
        if label.is_empty()
            || label.len() > MAX_LABEL_LEN
            || label.starts_with('-')
            || label.ends_with('-')
        {
            return Err(InputError::MalformedInstance);
        }
    }
    Ok(host)
}

/// A prefix is exactly one ASCII punctuation character (`!`, `/`, `^`, ...).
pub fn validate_command_prefix(prefix: &str) -> Result<char, InputError> {
    let mut chars = prefix.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_punctuation() => Ok(c),
        _ => Err(InputError::InvalidPrefix(prefix.to_string())),
    }
}

/// Command names are non-empty and contain no whitespace.
pub fn validate_command_name(name: &str) -> Result<(), InputError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(InputError::InvalidCommandName(name.to_string()));
    }
    Ok(())
}

/// OAuth codes are pasted by hand over the radio; surrounding whitespace is dropped.
pub fn validate_auth_code(code: &str) -> Result<String, InputError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptyCode);
    }
    Ok(trimmed.to_string())
}

/// Strip control characters (newlines and tabs survive) and enforce the status limit.
pub fn sanitize_post_text(text: &str) -> Result<String, InputError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    if cleaned.chars().count() > MAX_POST_CHARS {
        return Err(InputError::PostTooLong {
            max: MAX_POST_CHARS,
        });
    }
    Ok(cleaned)
}
