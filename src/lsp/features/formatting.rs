//! Document formatting: delegates to [`crate::format`]'s
//! pure pretty-printer and turns the before/after line diff into the
//! `TextEdit` sequence the wire protocol expects.

use tower_lsp::lsp_types::TextEdit;

use crate::format::{diff_to_edits, format_source, FormatOutcome};

pub enum Formatting {
    Edits(Vec<TextEdit>),
    /// The document has parse errors; formatting surfaces this as a
    /// `ParseError` response for formatting requests specifically (unlike
    /// diagnostics, which swallow parse failures and keep the prior AST).
    ParseErrors,
}

pub fn format(text: &str) -> Formatting {
    match format_source(text) {
        FormatOutcome::Formatted(formatted) => Formatting::Edits(diff_to_edits(text, &formatted)),
        FormatOutcome::ParseErrors => Formatting::ParseErrors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_a_compact_call_into_the_canonical_indented_form() {
        let edits = match format("go_test(name=\"x\",srcs=[\"x.go\"])\n") {
            Formatting::Edits(edits) => edits,
            Formatting::ParseErrors => panic!("expected a clean parse"),
        };
        assert!(!edits.is_empty());
        assert!(edits[0].new_text.contains("name = \"x\""));
    }

    #[test]
    fn an_already_formatted_document_yields_no_edits() {
        let src = "go_test(\n    name = \"x\",\n)\n";
        let edits = match format(src) {
            Formatting::Edits(edits) => edits,
            Formatting::ParseErrors => panic!("expected a clean parse"),
        };
        assert!(edits.is_empty());
    }

    #[test]
    fn a_malformed_document_reports_parse_errors_instead_of_edits() {
        let outcome = format("go_library(name = \"core\"\n");
        assert!(matches!(outcome, Formatting::ParseErrors));
    }
}
