//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from internal
//! error types to the unified Error type.

use super::types::Error;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<crate::omml::OmmlError> for Error {
    fn from(err: crate::omml::OmmlError) -> Self {
        match err {
            crate::omml::OmmlError::Xml(s) => Error::Xml(s),
            other => Error::TransformationFailure(other.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_omml_error_maps_to_transformation_failure() {
        let err: Error = crate::omml::OmmlError::InvalidStructure("no root".into()).into();
        assert!(matches!(err, Error::TransformationFailure(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_zip_error_maps_to_export() {
        let err: Error = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(err, Error::Export(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_user_message_is_short() {
        assert_eq!(Error::NoSelection.user_message(), "Select some text first.");
        assert!(!Error::SelectionLost.user_message().is_empty());
    }
}
