//! Language tag handling for contact registration.
//!
//! Accepts BCP 47 style tags (`en`, `en-US`, `pt_BR`, `fra`) and reduces them
//! to the ISO 639-3 code of their base language.

use isolang::Language;

use crate::error::ChannelHandlerError;

/// Parse `tag` and return the ISO 639-3 code of its base language.
pub fn base_language_iso3(tag: &str) -> Result<&'static str, ChannelHandlerError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ChannelHandlerError::InvalidLanguage(
            "empty language tag".to_string(),
        ));
    }

    let mut subtags = tag.split(['-', '_']);
    let base = subtags.next().unwrap_or_default().to_ascii_lowercase();

    if !(2..=3).contains(&base.len()) || !base.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ChannelHandlerError::InvalidLanguage(format!(
            "'{}' is not well-formed",
            tag
        )));
    }

    for subtag in subtags {
        let well_formed = !subtag.is_empty()
            && subtag.len() <= 8
            && subtag.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(ChannelHandlerError::InvalidLanguage(format!(
                "'{}' is not well-formed",
                tag
            )));
        }
    }

    let language = match base.len() {
        2 => Language::from_639_1(&base),
        _ => Language::from_639_3(&base),
    };

    language.map(|l| l.to_639_3()).ok_or_else(|| {
        ChannelHandlerError::InvalidLanguage(format!(
            "subtag '{}' is well-formed but unknown",
            base
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_letter_base() {
        assert_eq!(base_language_iso3("en").unwrap(), "eng");
        assert_eq!(base_language_iso3("es").unwrap(), "spa");
    }

    #[test]
    fn region_and_underscore_forms() {
        assert_eq!(base_language_iso3("en-US").unwrap(), "eng");
        assert_eq!(base_language_iso3("pt_BR").unwrap(), "por");
        assert_eq!(base_language_iso3("zh-Hant-TW").unwrap(), "zho");
    }

    #[test]
    fn three_letter_base() {
        assert_eq!(base_language_iso3("fra").unwrap(), "fra");
        assert_eq!(base_language_iso3("KIN").unwrap(), "kin");
    }

    #[test]
    fn malformed_tags_rejected() {
        assert!(base_language_iso3("").is_err());
        assert!(base_language_iso3("e").is_err());
        assert!(base_language_iso3("english").is_err());
        assert!(base_language_iso3("en--US").is_err());
        assert!(base_language_iso3("en-US!").is_err());
    }

    #[test]
    fn unknown_language_rejected() {
        let err = base_language_iso3("xx").unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }
}
