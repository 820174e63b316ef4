//! Structured text extraction.
//!
//! A [`TemplateParser`] shreds semi-structured command output into ordered
//! records using a pattern template. [`TextFsmParser`] is the production
//! implementation built on `textfsm-rust`.

use std::collections::HashMap;

use textfsm_rust::Template;

use crate::error::ExtractError;

/// One parsed record: value name to captured text.
pub type Record = HashMap<String, String>;

/// Template-driven text-to-records parser.
pub trait TemplateParser: Send + Sync {
    /// Apply `template` to `raw` and return the records in output order.
    ///
    /// An empty vector is a valid result (zero matches).
    fn parse(&self, template: &str, raw: &str) -> Result<Vec<Record>, ExtractError>;
}

/// [`TemplateParser`] backed by TextFSM templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFsmParser;

impl TemplateParser for TextFsmParser {
    fn parse(&self, template: &str, raw: &str) -> Result<Vec<Record>, ExtractError> {
        let template =
            Template::parse_str(template).map_err(|e| ExtractError::Template(e.to_string()))?;

        let mut parser = template.parser();
        parser
            .parse_text_to_dicts(raw)
            .map_err(|e| ExtractError::Template(e.to_string()))
    }
}
