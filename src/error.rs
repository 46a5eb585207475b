//! Errores de ensamblado y su presentación.

use crate::{
    codegen::ConflictError,
    lex::LexerError,
    parse::ParserError,
    semantic::LabelError,
    source::{Located, Location},
};

use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error de cualquiera de las fases, con su ubicación original.
#[derive(Debug)]
pub enum CompileError {
    Lex(Located<LexerError>),
    Parse(Located<ParserError>),
    Label(Located<LabelError>),
    Conflict(Located<ConflictError>),
}

impl CompileError {
    /// Categoría legible del error.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lexical error",
            CompileError::Parse(error) if error.as_ref().is_structural() => "structural error",
            CompileError::Parse(_) => "syntax error",
            CompileError::Label(_) => "label error",
            CompileError::Conflict(_) => "resource conflict",
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CompileError::Lex(error) => error.location(),
            CompileError::Parse(error) => error.location(),
            CompileError::Label(error) => error.location(),
            CompileError::Conflict(error) => error.location(),
        }
    }

    /// Error interno, sin ubicación.
    pub fn error(&self) -> &(dyn Error + 'static) {
        match self {
            CompileError::Lex(error) => error.as_ref(),
            CompileError::Parse(error) => error.as_ref(),
            CompileError::Label(error) => error.as_ref(),
            CompileError::Conflict(error) => error.as_ref(),
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} at {}: {}", self.kind(), self.location(), self.error())
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.error())
    }
}

impl From<Located<LexerError>> for CompileError {
    fn from(error: Located<LexerError>) -> Self {
        CompileError::Lex(error)
    }
}

impl From<Located<ParserError>> for CompileError {
    fn from(error: Located<ParserError>) -> Self {
        CompileError::Parse(error)
    }
}

impl From<Located<LabelError>> for CompileError {
    fn from(error: Located<LabelError>) -> Self {
        CompileError::Label(error)
    }
}

impl From<Located<ConflictError>> for CompileError {
    fn from(error: Located<ConflictError>) -> Self {
        CompileError::Conflict(error)
    }
}

/// Reporte de errores al estilo de un compilador, con extractos del
/// código fuente y la región afectada subrayada.
pub struct Diagnostics<'a>(&'a [CompileError]);

impl<'a> From<&'a [CompileError]> for Diagnostics<'a> {
    fn from(errors: &'a [CompileError]) -> Self {
        Diagnostics(errors)
    }
}

impl Display for Diagnostics<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics(errors) = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors.iter() {
            writeln!(fmt, "{}: {}", error.kind(), error.error())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                let line = location.source().line(line_number);
                writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;
            }

            let (from, to) = (location.start().column(), location.end().column());
            let min = from.min(to).max(1);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

#[cfg(test)]
mod test {
    use crate::compile_named;
    use pretty_assertions::assert_eq;

    #[test]
    fn kinds() {
        let kind = |text: &str| compile_named(text, "<test>").errors[0].kind();

        assert_eq!(kind("a := b # c;"), "lexical error");
        assert_eq!(kind("rd"), "syntax error");
        assert_eq!(kind("rd; rd; rd; rd; rd; rd; rd;"), "structural error");
        assert_eq!(kind("goto nope;"), "label error");
        assert_eq!(kind("rd; wr;"), "resource conflict");
    }

    #[test]
    fn one_line_summary() {
        let output = compile_named("rd;\nrd; wr;", "prog.mal");
        assert_eq!(
            output.errors[0].to_string(),
            "resource conflict at prog.mal:[2:5-2:6]: Memory read and write in the same cycle"
        );
    }

    #[test]
    fn excerpt_and_underline() {
        let output = compile_named("rd;\nac := mar;", "prog.mal");
        let rendered = super::Diagnostics::from(&output.errors[..]).to_string();

        assert_eq!(
            rendered,
            "resource conflict: Register `mar` cannot be read\n\
             \x20--> prog.mal:[2:1-2:9]\n\
             \x20 |\n\
             2 | ac := mar;\n\
             \x20 | ^^^^^^^^^\n\
             \n\
             Build failed with 1 error\n"
        );
    }
}
