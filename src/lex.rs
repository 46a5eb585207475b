//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del ensamblador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! y tabuladores se descartan durante esta operación. Cada token emitido está
//! asociado a una ubicación en el código fuente original, lo cual permite
//! rastrear errores tanto en los mismos como en constructos de fases
//! posteriores.
//!
//! # Sensibilidad al contexto
//! Un mismo término puede ser un registro, la definición de una etiqueta o
//! una referencia a etiqueta. Para decidir, el lexer observa el [`Context`]
//! derivado del token anterior junto con un lookahead limitado:
//! - Al inicio de una línea, un término seguido de `:` (pero no de `:=`)
//!   define una etiqueta. Si le sigue `:=` debe ser un registro. En
//!   cualquier otro caso se trata como etiqueta incompleta y el parser se
//!   encargará de exigir el `:` faltante.
//! - Después de `goto`, cualquier término es una referencia a etiqueta y
//!   nunca se compara contra el catálogo de registros.
//! - En el resto de posiciones el término debe nombrar un registro, salvo
//!   que le siga `:`. Tal etiqueta fuera de lugar llega hasta el parser,
//!   que la rechaza como error estructural.
//!
//! Las constantes `0`, `1` y `-1` son registros del catálogo, por lo cual
//! los literales numéricos siguen exactamente el mismo camino que las
//! palabras. El signo `-` solo es válido como parte de tales nombres.
//!
//! # Reglas importantes del lenguaje
//! - Palabras clave y registros distinguen mayúsculas de minúsculas.
//! - Las etiquetas solo pueden incluir letras y dígitos.
//! - Una secuencia de saltos de línea produce un único token [`Token::Newline`],
//!   el cual termina una instrucción.
//!
//! # Errores
//! El lexer se detiene en el primer error. No se intenta recuperación, ya que
//! ningún error léxico permite avanzar a las demás fases.

use crate::{
    regs::Register,
    source::{InputStream, Located, Location},
};

use std::{
    collections::VecDeque,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Al inicio de línea, un término seguido de `:=` no es un registro.
    #[error("Expected register or label, found `{0}`")]
    ExpectedRegisterOrLabel(String),

    /// Un término en posición de operando no es un registro.
    #[error("Expected register, found `{0}`")]
    ExpectedRegister(String),

    /// Una etiqueta contiene caracteres distintos de letras y dígitos.
    #[error("Label `{0}` may only contain letters and digits")]
    BadLabel(String),
}

/// Nombre de una etiqueta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Nombre de registro.
    Register(Register),

    /// Definición o referencia de etiqueta.
    Label(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// `:=`
    Assign,

    /// `+`
    Plus,

    /// `:`
    Colon,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// Fin de instrucción.
    Newline,
}

impl Token {
    /// Clasificación gruesa del token.
    pub fn kind(&self) -> TokenKind {
        use Token::*;

        match self {
            Register(_) => TokenKind::Register,
            Label(_) => TokenKind::Label,
            Keyword(keyword) => keyword.kind(),
            Assign | Plus => TokenKind::Operation,
            Colon => TokenKind::LabelDefiner,
            Semicolon | Comma => TokenKind::SubinstructionSeparator,
            OpenParen | CloseParen => TokenKind::Wrapper,
            Newline => TokenKind::Newline,
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Register(register) => write!(fmt, "register `{}`", register),
            Label(label) => write!(fmt, "label `{}`", label),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Assign => fmt.write_str("`:=`"),
            Plus => fmt.write_str("`+`"),
            Colon => fmt.write_str("`:`"),
            Semicolon => fmt.write_str("`;`"),
            Comma => fmt.write_str("`,`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            Newline => fmt.write_str("end of line"),
        }
    }
}

/// Categorías de tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Operation,
    ParamOperation,
    IfKeyword,
    JumpCondition,
    LabelDefiner,
    SubinstructionSeparator,
    Wrapper,
    Newline,
    Register,
    Label,
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Rd,
    Wr,
    Halt,
    Band,
    Lshift,
    Rshift,
    Inv,
    If,
    Then,
    Goto,
    Z,
    N,
}

impl Keyword {
    /// Categoría de token a la que pertenece la palabra clave.
    pub fn kind(self) -> TokenKind {
        use Keyword::*;

        match self {
            Rd | Wr | Halt => TokenKind::Operation,
            Band | Lshift | Rshift | Inv => TokenKind::ParamOperation,
            If | Then | Goto => TokenKind::IfKeyword,
            Z | N => TokenKind::JumpCondition,
        }
    }
}

#[rustfmt::skip]
const KEYWORDS: &[(&str, Keyword)] = &[
    ("rd",     Keyword::Rd),
    ("wr",     Keyword::Wr),
    ("halt",   Keyword::Halt),
    ("band",   Keyword::Band),
    ("lshift", Keyword::Lshift),
    ("rshift", Keyword::Rshift),
    ("inv",    Keyword::Inv),
    ("if",     Keyword::If),
    ("then",   Keyword::Then),
    ("goto",   Keyword::Goto),
    ("z",      Keyword::Z),
    ("n",      Keyword::N),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Rd     => "rd",
            Wr     => "wr",
            Halt   => "halt",
            Band   => "band",
            Lshift => "lshift",
            Rshift => "rshift",
            Inv    => "inv",
            If     => "if",
            Then   => "then",
            Goto   => "goto",
            Z      => "z",
            N      => "n",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Contexto en el que se lee el siguiente token.
///
/// Se deriva exclusivamente del token anterior y determina cómo
/// se clasifican los términos.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Context {
    /// Inicio de una instrucción.
    LineStart,

    /// Inmediatamente después de `goto`.
    AfterGoto,

    /// Cualquier otra posición.
    Operand,
}

impl Context {
    /// Contexto que sigue a un token.
    pub fn after(token: &Token) -> Context {
        match token {
            Token::Newline => Context::LineStart,
            Token::Keyword(Keyword::Goto) => Context::AfterGoto,
            _ => Context::Operand,
        }
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de su estado actual, el siguiente carácter encontrado
/// en el flujo de entrada y el contexto del token anterior.
pub struct Lexer<S: Iterator> {
    source: S,
    lookahead: VecDeque<(char, Location)>,
    state: State,
    context: Context,
    start: Location,
    next: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error, el lexer no emite más tokens.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `:`, que puede iniciar `:=`.
    Definer,

    /// Secuencia de saltos de línea.
    Newlines,

    /// Término que puede ser palabra clave, registro o etiqueta.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    ///
    /// El inicio del flujo se trata como el inicio de una línea.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source,
            lookahead: VecDeque::new(),
            state: State::Start,
            context: Context::LineStart,
            start,
            next,
        }
    }

    /// Reduce la entrada a una secuencia completa de tokens o al
    /// primer error encontrado.
    pub fn tokenize(self) -> Result<Vec<Located<Token>>, Located<LexerError>> {
        self.collect()
    }

    /// Intenta construir un siguiente token en el contexto dado.
    fn lex(&mut self, context: Context) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            let next_char = self.peek(0);

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter. El estado se toma
            // por valor y cada brazo que no emite deja el siguiente
            match (std::mem::replace(&mut self.state, Start), next_char) {
                (Error, _) => {
                    self.state = Error;
                    return Ok(None);
                }

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some(':')) => self.state = Definer,
                (Start, Some('\n')) => self.state = Newlines,

                // Registros, etiquetas y palabras clave
                (Start, Some(c)) if is_word_char(c) => self.state = Word(c.to_string()),

                // Espacios en blanco y caracteres inesperados
                (Start, Some(' ' | '\t')) => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => break Ok(token),

                // `:` puede ser el inicio de `:=` o una definición de etiqueta
                (Definer, Some('=')) => self.state = Complete(Assign),
                (Definer, _) => break Ok(Colon),

                // Los saltos de línea consecutivos colapsan en uno solo
                (Newlines, Some('\n')) => self.state = Newlines,
                (Newlines, _) => break Ok(Newline),

                // Extensión de términos
                (Word(mut word), Some(c)) if is_word_char(c) => {
                    word.push(c);
                    self.state = Word(word);
                }

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => break self.classify(word, context),
            }

            // Aquí se consume el carácter que se observó con lookahead
            if let Some((_, next_position)) = self.lookahead.pop_front() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }

    /// Decide qué representa un término terminado.
    ///
    /// Las palabras clave tienen precedencia sobre cualquier otra
    /// interpretación, sin importar el contexto.
    fn classify(&mut self, word: String, context: Context) -> Result<Token, LexerError> {
        if let Ok(keyword) = Keyword::from_str(&word) {
            return Ok(Token::Keyword(keyword));
        }

        match context {
            Context::LineStart => match self.after_word() {
                Follow::Assignment => Register::from_name(&word)
                    .map(Token::Register)
                    .ok_or(LexerError::ExpectedRegisterOrLabel(word)),

                Follow::Definer | Follow::Other => label(word),
            },

            Context::AfterGoto => label(word),

            // Una definición fuera de lugar se deja pasar como etiqueta
            // para que el parser la reporte como error estructural
            Context::Operand => match self.after_word() {
                Follow::Definer => label(word),
                Follow::Assignment | Follow::Other => Register::from_name(&word)
                    .map(Token::Register)
                    .ok_or(LexerError::ExpectedRegister(word)),
            },
        }
    }

    /// Observa, sin consumir, lo que sigue a un término al inicio de línea.
    fn after_word(&mut self) -> Follow {
        let mut offset = 0;
        while let Some(' ' | '\t') = self.peek(offset) {
            offset += 1;
        }

        match (self.peek(offset), self.peek(offset + 1)) {
            (Some(':'), Some('=')) => Follow::Assignment,
            (Some(':'), _) => Follow::Definer,
            _ => Follow::Other,
        }
    }

    /// Observa el carácter ubicado `offset` posiciones más adelante.
    fn peek(&mut self, offset: usize) -> Option<char> {
        while self.lookahead.len() <= offset {
            let next = self.source.next()?;
            self.lookahead.push_back(next);
        }

        self.lookahead.get(offset).map(|&(c, _)| c)
    }
}

/// Lo que sigue a un término al inicio de una línea.
enum Follow {
    /// `:=`
    Assignment,

    /// `:` sin `=`
    Definer,

    /// Cualquier otra cosa.
    Other,
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex(self.context) {
            Ok(None) => None,
            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;
                self.context = Context::after(&token);

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.start.clone())))
            }
        }
    }
}

/// Construye una etiqueta, validando sus caracteres.
fn label(word: String) -> Result<Token, LexerError> {
    if word.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(Token::Label(Identifier::from(word.as_str())))
    } else {
        Err(LexerError::BadLabel(word))
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source;

    fn tokens(text: &str) -> Vec<Token> {
        let (start, stream) = source::consume(text, "<test>");
        Lexer::new(start, stream)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn error(text: &str) -> Located<LexerError> {
        let (start, stream) = source::consume(text, "<test>");
        Lexer::new(start, stream)
            .tokenize()
            .expect_err("lexing should fail")
    }

    fn label(name: &str) -> Token {
        Token::Label(Identifier::from(name))
    }

    #[test]
    fn assignment_at_line_start_is_a_register() {
        use Token::*;

        assert_eq!(
            tokens("mar := pc; rd;"),
            vec![
                Register(crate::regs::Register::MAR),
                Assign,
                Register(crate::regs::Register::PC),
                Semicolon,
                Keyword(super::Keyword::Rd),
                Semicolon,
                Newline,
            ]
        );

        assert_eq!(tokens("a:=b;")[0], Register(crate::regs::Register::A));
    }

    #[test]
    fn numeric_label_definition() {
        use Token::*;

        assert_eq!(
            tokens("0:   ac := ac + 1;"),
            vec![
                label("0"),
                Colon,
                Register(crate::regs::Register::AC),
                Assign,
                Register(crate::regs::Register::AC),
                Plus,
                Register(crate::regs::Register::ONE),
                Semicolon,
                Newline,
            ]
        );
    }

    #[test]
    fn label_definer_may_be_spaced() {
        assert_eq!(tokens("loop : rd;")[..2], [label("loop"), Token::Colon]);
        assert_eq!(tokens("a: rd;")[..2], [label("a"), Token::Colon]);
    }

    #[test]
    fn goto_target_is_never_a_register() {
        use Token::*;

        assert_eq!(
            tokens("goto a; if n then goto 28;"),
            vec![
                Keyword(super::Keyword::Goto),
                label("a"),
                Semicolon,
                Keyword(super::Keyword::If),
                Keyword(super::Keyword::N),
                Keyword(super::Keyword::Then),
                Keyword(super::Keyword::Goto),
                label("28"),
                Semicolon,
                Newline,
            ]
        );
    }

    #[test]
    fn negative_constant_and_wrappers() {
        use Token::*;

        assert_eq!(
            tokens("sp := sp + (-1);")[4..7],
            [
                OpenParen,
                Register(crate::regs::Register::MINUS_ONE),
                CloseParen
            ]
        );
    }

    #[test]
    fn newline_runs_collapse() {
        use Token::*;

        assert_eq!(
            tokens("rd;\n\n\nwr;"),
            vec![
                Keyword(super::Keyword::Rd),
                Semicolon,
                Newline,
                Keyword(super::Keyword::Wr),
                Semicolon,
                Newline,
            ]
        );
    }

    #[test]
    fn token_kinds() {
        let kinds: Vec<_> = tokens("x: a := band(b, c); if z then goto x;")
            .iter()
            .map(Token::kind)
            .collect();

        use TokenKind::*;
        assert_eq!(
            kinds,
            vec![
                Label,
                LabelDefiner,
                Register,
                Operation,
                ParamOperation,
                Wrapper,
                Register,
                SubinstructionSeparator,
                Register,
                Wrapper,
                SubinstructionSeparator,
                IfKeyword,
                JumpCondition,
                IfKeyword,
                IfKeyword,
                Label,
                SubinstructionSeparator,
                Newline,
            ]
        );
    }

    #[test]
    fn context_follows_previous_token() {
        assert_eq!(Context::after(&Token::Newline), Context::LineStart);
        assert_eq!(
            Context::after(&Token::Keyword(Keyword::Goto)),
            Context::AfterGoto
        );
        assert_eq!(Context::after(&Token::Semicolon), Context::Operand);
        assert_eq!(Context::after(&label("x")), Context::Operand);
    }

    #[test]
    fn unknown_operand_register() {
        let error = error("a := foo;");
        assert!(matches!(error.as_ref(), LexerError::ExpectedRegister(word) if word == "foo"));
        assert_eq!(error.location().start().line(), 1);
        assert_eq!(error.location().start().column(), 6);
    }

    #[test]
    fn unknown_destination_register() {
        let error = error("rd;\nfoo := b;");
        assert!(matches!(
            error.as_ref(),
            LexerError::ExpectedRegisterOrLabel(word) if word == "foo"
        ));
        assert_eq!(error.location().start().line(), 2);
        assert_eq!(error.location().start().column(), 1);
    }

    #[test]
    fn bad_character() {
        let error = error("a := b # c;");
        assert!(matches!(error.as_ref(), LexerError::BadChar('#')));
        assert_eq!(error.location().start().column(), 8);
    }

    #[test]
    fn definition_inside_an_instruction_is_a_label() {
        use Token::*;

        assert_eq!(
            tokens("rd; x : wr;")[2..4],
            [label("x"), Colon]
        );

        assert_eq!(
            tokens("rd; a := b;")[2],
            Register(crate::regs::Register::A)
        );
    }

    #[test]
    fn labels_reject_minus() {
        assert!(matches!(
            error("goto -5;").as_ref(),
            LexerError::BadLabel(word) if word == "-5"
        ));
    }
}
