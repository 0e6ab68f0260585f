//! Normalization of source-image references before they reach a provider.
//!
//! Callers hand us one of three shapes: a remote `http(s)` URL, an inline
//! `data:` URL, or anything else, which is forwarded as is (usually a bare
//! base64 payload). Providers differ in what they accept: some want
//! [`ImageSource::as_bare_payload`], others take the caller's reference
//! untouched.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    Remote(&'a str),
    DataUrl { media_type: &'a str, payload: &'a str },
    Bare(&'a str),
}

impl<'a> ImageSource<'a> {
    pub fn parse(input: &'a str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::required("imageUrl"));
        }

        if let Some(rest) = input.strip_prefix("data:") {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| Error::validation("imageUrl is a data URL without a payload"))?;
            if payload.is_empty() {
                return Err(Error::validation("imageUrl is a data URL without a payload"));
            }
            let media_type = meta.split(';').next().unwrap_or_default();
            validate_base64(payload)?;
            return Ok(Self::DataUrl { media_type, payload });
        }

        if input.starts_with("https://") || input.starts_with("http://") {
            return Ok(Self::Remote(input));
        }

        Ok(Self::Bare(input))
    }

    /// Encoded payload with any `data:` scheme and metadata removed.
    /// Remote URLs are returned unchanged.
    pub fn as_bare_payload(&self) -> &'a str {
        match *self {
            Self::Remote(url) => url,
            Self::DataUrl { payload, .. } => payload,
            Self::Bare(payload) => payload,
        }
    }
}

/// Padding optional; line breaks and other ASCII whitespace are ignored.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn validate_base64(payload: &str) -> Result<()> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT
        .decode(compact)
        .map(|_| ())
        .map_err(|e| Error::validation(format!("imageUrl is not valid base64 image data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_B64: &str = "iVBORw0KGgo=";

    #[test]
    fn test_data_url_is_stripped_to_payload() {
        let input = format!("data:image/png;base64,{PNG_B64}");
        let source = ImageSource::parse(&input).unwrap();
        assert_eq!(source, ImageSource::DataUrl { media_type: "image/png", payload: PNG_B64 });
        assert_eq!(source.as_bare_payload(), PNG_B64);
        assert!(!source.as_bare_payload().starts_with("data:"));
    }

    #[test]
    fn test_remote_url_passes_through() {
        let source = ImageSource::parse("https://x/y.png").unwrap();
        assert_eq!(source.as_bare_payload(), "https://x/y.png");
        assert_eq!(source, ImageSource::Remote("https://x/y.png"));
    }

    #[test]
    fn test_bare_payload_is_kept() {
        let source = ImageSource::parse(PNG_B64).unwrap();
        assert_eq!(source, ImageSource::Bare(PNG_B64));
    }

    #[test]
    fn test_rejects_empty_and_broken_inputs() {
        assert!(ImageSource::parse("").unwrap_err().is_validation());
        assert!(ImageSource::parse("data:image/png;base64").unwrap_err().is_validation());
        assert!(ImageSource::parse("data:image/png;base64,").unwrap_err().is_validation());
        assert!(ImageSource::parse("data:image/png;base64,not base64 at all!").unwrap_err().is_validation());
    }

    #[test]
    fn test_other_references_are_forwarded_unchanged() {
        for input in ["/uploads/still.png", "iVBORw0KGgo", "iVBORw0K\nGgo="] {
            assert_eq!(ImageSource::parse(input).unwrap(), ImageSource::Bare(input));
        }
    }

    #[test]
    fn test_data_url_payload_may_be_wrapped_or_unpadded() {
        let wrapped = "data:image/png;base64,iVBORw0K\r\nGgo=";
        assert!(matches!(ImageSource::parse(wrapped), Ok(ImageSource::DataUrl { .. })));
        let unpadded = "data:image/png;base64,iVBORw0KGgo";
        assert_eq!(ImageSource::parse(unpadded).unwrap().as_bare_payload(), "iVBORw0KGgo");
    }
}
