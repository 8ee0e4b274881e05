//! Recoverable-problem reporting for a single conversion.

/// A recoverable problem hit while converting one message.
///
/// None of these abort the conversion; each degrades gracefully (skip the
/// attachment, leave the element as-is, or remove it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An attachment could not be written to disk.
    AttachmentWrite { filename: String, cause: String },

    /// A remote fetch failed: transport error, timeout, non-2xx status, or
    /// a body shorter than advertised.
    FetchFailed { url: String, cause: String },

    /// A `src` value with an HTTP scheme that did not parse as a URL.
    MalformedUrl { src: String, cause: String },

    /// A remote reference with no usable fetched file behind it.
    UnresolvedRemote { url: String },

    /// A `cid:` reference with no matching attachment.
    UnresolvedCid { cid: String },

    /// A fetched file whose sniffed type was not the image the element
    /// expects.
    TypeMismatch { url: String, detected: String },

    /// A reference scheme the converter does not handle.
    UnsupportedReference { src: String },
}

/// Collects the warnings of one message and mirrors them to the log.
///
/// The report is handed down through the pipeline instead of components
/// logging into ambient global state, so tests assert on the collected
/// warnings rather than parsing log output.
#[derive(Debug, Default)]
pub struct Report {
    warnings: Vec<Warning>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it as a tracing event.
    pub fn warn(&mut self, warning: Warning) {
        match &warning {
            Warning::AttachmentWrite { filename, cause } => {
                tracing::warn!(filename = %filename, error = %cause, "Cannot write attachment");
            }
            Warning::FetchFailed { url, cause } => {
                tracing::warn!(url = %url, error = %cause, "Download failed");
            }
            Warning::MalformedUrl { src, cause } => {
                tracing::warn!(src = %src, error = %cause, "Cannot parse media URL");
            }
            Warning::UnresolvedRemote { url } => {
                tracing::warn!(url = %url, "Remote reference left unresolved");
            }
            Warning::UnresolvedCid { cid } => {
                tracing::warn!(cid = %cid, "Content id not found");
            }
            Warning::TypeMismatch { url, detected } => {
                tracing::warn!(url = %url, detected = %detected, "Fetched file is not an image");
            }
            Warning::UnsupportedReference { src } => {
                tracing::warn!(src = %src, "Unsupported media reference");
            }
        }
        self.warnings.push(warning);
    }

    /// Warnings recorded so far, in emission order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consume the report, keeping only the warnings.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_in_order() {
        let mut report = Report::new();
        report.warn(Warning::UnresolvedCid {
            cid: "img1".into(),
        });
        report.warn(Warning::UnsupportedReference {
            src: "data:;base64,aGk=".into(),
        });

        let warnings = report.into_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(&warnings[0], Warning::UnresolvedCid { cid } if cid == "img1"));
        assert!(matches!(&warnings[1], Warning::UnsupportedReference { .. }));
    }
}
