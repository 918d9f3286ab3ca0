use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Empty value for '{0}'.")]
    EmptyValue(String),

    #[error("Invalid {kind} value for {key}: '{value}'")]
    InvalidValue {
        key: String,
        kind: &'static str,
        value: String,
    },
}

/// Splits `KEY=VALUE`, trimming both sides.
pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidKeyValue(pair.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(ParseError::InvalidKeyValue(pair.to_string()));
    }
    if value.is_empty() {
        return Err(ParseError::EmptyValue(key.to_string()));
    }
    Ok((key, value))
}

/// Parses a comma-separated list such as `La,Mn,O`, dropping empty items.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: &str,
    kind: &'static str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        kind,
        value: value.to_string(),
    })
}
