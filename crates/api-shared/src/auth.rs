/// Why a request's API key was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyRejection {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates a provided API key against the configured one.
///
/// When no key is configured every request is accepted. The expected key is passed in rather
/// than read from the environment so that configuration is resolved once at startup.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), ApiKeyRejection> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match provided {
        None => Err(ApiKeyRejection::Missing),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(ApiKeyRejection::Invalid),
    }
}
