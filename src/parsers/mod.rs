//! Test result file ingestion -- format detection and parsers.

pub mod junit;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized results format: {path}")]
    UnknownFormat { path: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML in {path}: {source}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::Error,
    },
}

/// Supported results formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsFormat {
    /// JUnit-style XML, which covers TestNG output as well.
    Junit,
    Unknown,
}

/// Detect the format of a results file by its name. Most TestNG and JUnit
/// runners emit JUnit-ish XML, so `.xml` maps to the JUnit parser.
pub fn detect_format(path: &Path) -> ResultsFormat {
    let is_xml = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false);
    if is_xml {
        ResultsFormat::Junit
    } else {
        ResultsFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_xml() {
        assert_eq!(detect_format(Path::new("results.xml")), ResultsFormat::Junit);
        assert_eq!(detect_format(Path::new("out/TEST-suite.XML")), ResultsFormat::Junit);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format(Path::new("results.json")), ResultsFormat::Unknown);
        assert_eq!(detect_format(Path::new("results")), ResultsFormat::Unknown);
    }
}
