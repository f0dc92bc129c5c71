//! Canonical contact addresses.
//!
//! A URN is `scheme:path`, e.g. `whatsapp:15551234567` or `ext:alice`. It is
//! the join key between a provider identity and the host's contact store.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChannelHandlerError;

const MAX_PATH_LEN: usize = 255;
const MAX_TEL_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrnScheme {
    Tel,
    Whatsapp,
    Ext,
    Mailto,
}

impl UrnScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrnScheme::Tel => "tel",
            UrnScheme::Whatsapp => "whatsapp",
            UrnScheme::Ext => "ext",
            UrnScheme::Mailto => "mailto",
        }
    }
}

impl FromStr for UrnScheme {
    type Err = ChannelHandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tel" => Ok(UrnScheme::Tel),
            "whatsapp" => Ok(UrnScheme::Whatsapp),
            "ext" => Ok(UrnScheme::Ext),
            "mailto" => Ok(UrnScheme::Mailto),
            other => Err(ChannelHandlerError::InvalidUrn(format!(
                "unknown scheme '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for UrnScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable contact address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
    scheme: UrnScheme,
    path: String,
}

impl Urn {
    /// Build a URN from a scheme and a raw path, validating the path for the scheme.
    pub fn from_parts(scheme: UrnScheme, path: &str) -> Result<Self, ChannelHandlerError> {
        let path = path.trim();
        validate_path(scheme, path)?;
        Ok(Self {
            scheme,
            path: path.to_string(),
        })
    }

    /// WhatsApp ids are bare digits, without a leading `+`.
    pub fn whatsapp(number: &str) -> Result<Self, ChannelHandlerError> {
        Self::from_parts(UrnScheme::Whatsapp, number)
    }

    pub fn scheme(&self) -> UrnScheme {
        self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn validate_path(scheme: UrnScheme, path: &str) -> Result<(), ChannelHandlerError> {
    if path.is_empty() {
        return Err(ChannelHandlerError::InvalidUrn(format!(
            "empty path for scheme '{}'",
            scheme
        )));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(ChannelHandlerError::InvalidUrn(format!(
            "path longer than {} characters",
            MAX_PATH_LEN
        )));
    }

    let valid = match scheme {
        UrnScheme::Whatsapp => path.chars().all(|c| c.is_ascii_digit()),
        UrnScheme::Tel => {
            let digits = path.strip_prefix('+').unwrap_or(path);
            !digits.is_empty()
                && digits.len() <= MAX_TEL_LEN
                && digits.chars().all(|c| c.is_ascii_alphanumeric())
        }
        UrnScheme::Mailto => path.contains('@') && !path.chars().any(char::is_whitespace),
        UrnScheme::Ext => !path.chars().any(char::is_whitespace),
    };

    if valid {
        Ok(())
    } else {
        Err(ChannelHandlerError::InvalidUrn(format!(
            "invalid path '{}' for scheme '{}'",
            path, scheme
        )))
    }
}

impl std::fmt::Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)
    }
}

impl FromStr for Urn {
    type Err = ChannelHandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, path) = s
            .split_once(':')
            .ok_or_else(|| ChannelHandlerError::InvalidUrn(format!("missing scheme in '{}'", s)))?;
        Urn::from_parts(scheme.parse()?, path)
    }
}

impl TryFrom<String> for Urn {
    type Error = ChannelHandlerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_requires_digits() {
        assert!(Urn::whatsapp("15551234567").is_ok());
        assert!(Urn::whatsapp("+15551234567").is_err());
        assert!(Urn::whatsapp("5551234567@c.us").is_err());
        assert!(Urn::whatsapp("").is_err());
    }

    #[test]
    fn tel_allows_leading_plus() {
        let urn = Urn::from_parts(UrnScheme::Tel, "+15551234567").unwrap();
        assert_eq!(urn.path(), "+15551234567");
        assert_eq!(urn.to_string(), "tel:+15551234567");
        assert!(Urn::from_parts(UrnScheme::Tel, "+").is_err());
    }

    #[test]
    fn ext_rejects_whitespace() {
        assert!(Urn::from_parts(UrnScheme::Ext, "alice-01").is_ok());
        assert!(Urn::from_parts(UrnScheme::Ext, "alice 01").is_err());
    }

    #[test]
    fn mailto_needs_at_sign() {
        assert!(Urn::from_parts(UrnScheme::Mailto, "ana@example.com").is_ok());
        assert!(Urn::from_parts(UrnScheme::Mailto, "ana").is_err());
    }

    #[test]
    fn only_bridge_schemes_are_known() {
        for scheme in ["tel", "whatsapp", "ext", "mailto", "EXT"] {
            assert!(scheme.parse::<UrnScheme>().is_ok(), "{}", scheme);
        }
        for scheme in ["telegram", "facebook", "ws"] {
            assert!(scheme.parse::<UrnScheme>().is_err(), "{}", scheme);
        }
    }

    #[test]
    fn parse_round_trips_through_display() {
        let urn: Urn = "whatsapp:4915112345".parse().unwrap();
        assert_eq!(urn.scheme(), UrnScheme::Whatsapp);
        assert_eq!(urn.path(), "4915112345");
        assert!("nope".parse::<Urn>().is_err());
        assert!("sms:123".parse::<Urn>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let urn = Urn::from_parts(UrnScheme::Ext, "bob").unwrap();
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, "\"ext:bob\"");
        let parsed: Urn = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, urn);
    }
}
