//! Microensamblador para microarquitecturas estilo MIC-1.
//!
//! # Front end
//! Cada microprograma deriva de un único texto fuente. Este texto se
//! somete primero a análisis léxico en [`lex`], de lo cual se obtiene un
//! flujo de tokens. El flujo de tokens se dispone en un AST por medio de
//! análisis sintáctico en [`parse`], fase que además impone las reglas
//! estructurales de cada instrucción.
//!
//! # Back end
//! La generación de código ocurre en dos pasadas. La primera, en
//! [`semantic`], construye la tabla de etiquetas y verifica toda
//! referencia. La segunda, en [`codegen`], asigna buses, unidades
//! funcionales y líneas de control por instrucción, empaquetando cada
//! resultado en una palabra de 32 bits según el formato de [`word`].
//!
//! Ninguna fase realiza E/S de cara al usuario. Los errores se devuelven
//! como [`CompileError`] y su presentación queda a cargo de quien llama,
//! posiblemente mediante [`error::Diagnostics`].

use tracing::debug;

pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod regs;
pub mod semantic;
pub mod source;
pub mod word;

pub use error::CompileError;
pub use semantic::LabelTable;
pub use word::ControlWord;

use lex::Lexer;

/// Resultado de [`compile`].
///
/// `words` contiene una palabra por instrucción si y solo si `errors`
/// está vacío.
#[derive(Debug)]
pub struct Output {
    pub words: Vec<u32>,
    pub errors: Vec<CompileError>,
}

impl Output {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn control_words(&self) -> impl Iterator<Item = ControlWord> + '_ {
        self.words.iter().copied().map(ControlWord::from)
    }
}

/// Microprograma ensamblado junto a su tabla de etiquetas.
#[derive(Debug)]
pub struct Assembly {
    pub words: Vec<ControlWord>,
    pub labels: LabelTable,
}

/// Ensambla un microprograma anónimo.
pub fn compile(text: &str) -> Output {
    compile_named(text, "<input>")
}

/// Ensambla un microprograma, identificando su origen con `name` en
/// las ubicaciones de error.
pub fn compile_named(text: &str, name: &str) -> Output {
    match assemble(text, name) {
        Ok(assembly) => Output {
            words: assembly.words.into_iter().map(u32::from).collect(),
            errors: Vec::new(),
        },

        Err(errors) => Output {
            words: Vec::new(),
            errors,
        },
    }
}

/// Ejecuta todas las fases.
///
/// Errores léxicos, sintácticos y de conflicto detienen el proceso de
/// inmediato con un único error. Los errores de etiquetas se reportan
/// todos juntos.
pub fn assemble(text: &str, name: &str) -> Result<Assembly, Vec<CompileError>> {
    let (start, stream) = source::consume(text, name);

    let tokens = Lexer::new(start.clone(), stream)
        .tokenize()
        .map_err(|error| vec![CompileError::from(error)])?;

    debug!(tokens = tokens.len(), "lexical analysis done");

    let ast = parse::parse(tokens.iter(), start).map_err(|error| vec![CompileError::from(error)])?;
    debug!(instructions = ast.instructions().len(), "syntax analysis done");

    let labels = ast
        .resolve()
        .map_err(|errors| errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;

    debug!(labels = labels.len(), "label resolution done");

    let words = codegen::emit(&ast, &labels).map_err(|error| vec![CompileError::from(error)])?;
    debug!(words = words.len(), "code generation done");

    Ok(Assembly { words, labels })
}
