use crate::{
    codegen::SemanticError,
    lex::LexerError,
    parse::SyntaxError,
    source::Located,
};

use std::fmt::{self, Display};
use thiserror::Error;

/// Cualquier error que detiene una traducción.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Lex(#[from] LexerError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl TranslateError {
    /// Fase en la que ocurrió el error.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslateError::Lex(_) => "lexical error",
            TranslateError::Syntax(_) => "syntax error",
            TranslateError::Semantic(_) => "semantic error",
        }
    }
}

/// Presentación de un error para humanos.
///
/// Incluye la línea original y un marcador en la columna del error.
pub struct Diagnostic<'a> {
    name: &'a str,
    source: &'a str,
    error: &'a Located<TranslateError>,
}

impl<'a> Diagnostic<'a> {
    pub fn new(name: &'a str, source: &'a str, error: &'a Located<TranslateError>) -> Self {
        Diagnostic {
            name,
            source,
            error,
        }
    }
}

impl Display for Diagnostic<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostic {
            name,
            source,
            error,
        } = self;

        let position = error.position();
        writeln!(fmt, "{}: {}", error.val().kind(), error.val())?;
        writeln!(fmt, " --> {}:{}", name, position)?;

        let line_number = position.line();
        let line = match source.lines().nth(line_number as usize - 1) {
            Some(line) => line,
            None => return Ok(()),
        };

        let digits = line_number.to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;
        writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;
        writeln!(
            fmt,
            "{:digits$} | {:skip$}^",
            "",
            "",
            digits = digits,
            skip = position.column() as usize - 1
        )
    }
}
