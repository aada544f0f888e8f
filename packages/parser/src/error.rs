use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {start}: expected {expected}, found {found}")]
    UnexpectedToken {
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of expression at {pos}: expected {expected}")]
    UnexpectedEof { pos: usize, expected: String },

    #[error("Invalid syntax at {start}: {message}")]
    InvalidSyntax {
        start: usize,
        end: usize,
        message: String,
    },

    #[error("Unrecognized input at {start}: '{fragment}'")]
    LexerError {
        start: usize,
        end: usize,
        fragment: String,
    },
}

impl ParseError {
    pub fn unexpected_token_span(
        span: std::ops::Range<usize>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedToken {
            start: span.start,
            end: span.end,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize, expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            expected: expected.into(),
        }
    }

    pub fn invalid_syntax_span(span: std::ops::Range<usize>, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            start: span.start,
            end: span.end,
            message: message.into(),
        }
    }

    pub fn lexer_error(span: std::ops::Range<usize>, fragment: impl Into<String>) -> Self {
        Self::LexerError {
            start: span.start,
            end: span.end,
            fragment: fragment.into(),
        }
    }

    /// Byte range of the offending input
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            ParseError::UnexpectedToken { start, end, .. }
            | ParseError::InvalidSyntax { start, end, .. }
            | ParseError::LexerError { start, end, .. } => *start..*end,
            ParseError::UnexpectedEof { pos, .. } => *pos..*pos,
        }
    }
}

/// Pretty-print a parse error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let mut span = error.span();
    if span.start >= span.end {
        span = span.start.saturating_sub(1).min(source.len())..source.len().max(1);
    }

    let label = match error {
        ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected, .. } => {
            format!("expected {}", expected)
        }
        ParseError::InvalidSyntax { message, .. } => message.clone(),
        ParseError::LexerError { .. } => "not part of the expression language".to_string(),
    };

    let report = Report::build(ReportKind::Error, filename, span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, span))
                .with_color(Color::Red)
                .with_message(label),
        )
        .finish();

    let mut output = Vec::new();
    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}
