//! Análisis sintáctico.
//!
//! El parser es de descenso recursivo y consume por completo la secuencia
//! de tokens antes de ceder el árbol a fases posteriores. Cada instrucción
//! corresponde a una línea y recibe como dirección su posición en el
//! programa, sin importar el texto de su etiqueta. Las reglas estructurales
//! (cantidad de subinstrucciones, posición de definiciones de etiqueta y
//! aridad de operaciones parametrizadas) se verifican aquí, de modo que la
//! generación de código puede asumir un árbol bien formado.

use std::{
    fmt::{self, Display},
    iter::Peekable,
    marker::PhantomData,
};

use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Token},
    regs::Register,
    source::{Located, Location},
};

/// Límite de subinstrucciones por instrucción, incluyendo la etiqueta.
pub const MAX_SUBINSTRUCTIONS: usize = 6;

#[derive(Debug)]
pub struct Ast(Vec<Instruction>);

impl Ast {
    /// Instrucciones en orden de dirección.
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

#[derive(Debug)]
pub struct Instruction {
    label: Option<Located<Identifier>>,
    address: usize,
    subinstructions: Vec<Located<Subinstruction>>,
}

impl Instruction {
    pub fn label(&self) -> Option<&Located<Identifier>> {
        self.label.as_ref()
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn subinstructions(&self) -> &[Located<Subinstruction>] {
        &self.subinstructions
    }
}

#[derive(Debug)]
pub enum Subinstruction {
    Assign {
        dest: Located<Register>,
        source: Located<Expr>,
    },

    Goto {
        target: Located<Identifier>,
    },

    If {
        condition: Condition,
        target: Located<Identifier>,
    },

    ReadMem,
    WriteMem,
    Halt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Negative,
    Zero,
}

#[derive(Debug)]
pub enum Expr {
    Read(Located<Register>),
    Add(Located<Register>, Located<Register>),
    And(Located<Register>, Located<Register>),
    Unary(UnaryOp, Operand),
}

/// Operaciones parametrizadas de un solo operando.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    LeftShift,
    RightShift,
    Invert,
}

#[derive(Debug)]
pub enum Operand {
    Read(Located<Register>),
    Add(Located<Register>, Located<Register>),
}

/// Constructo que el parser esperaba encontrar.
#[derive(Debug)]
pub enum Expected {
    Token(Token),
    Register,
    Label,
    Subinstruction,
    Source,
    Condition,
}

impl Display for Expected {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Token(token) => token.fmt(fmt),
            Expected::Register => fmt.write_str("a register"),
            Expected::Label => fmt.write_str("a label"),
            Expected::Subinstruction => fmt.write_str("a sub-instruction"),
            Expected::Source => fmt.write_str("a register or a parameterized operation"),
            Expected::Condition => fmt.write_str("a jump condition (`z` or `n`)"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Expected, Token),

    #[error("Expected {0}, none was found instead")]
    MissingToken(Expected),

    #[error("Abrupt end of program")]
    UnexpectedEof,

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl ParserError {
    /// Determina si el error viola una regla estructural y no la gramática.
    pub fn is_structural(&self) -> bool {
        matches!(self, ParserError::Structural(_))
    }
}

#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("An instruction holds at most {MAX_SUBINSTRUCTIONS} sub-instructions, label included")]
    TooManySubinstructions,

    #[error("Label `{0}` may only be defined at the start of an instruction")]
    MisplacedLabel(Identifier),

    #[error("`{operation}` takes exactly {expected} operand(s)")]
    Arity { operation: Keyword, expected: usize },
}

pub trait TokenStream<'a>: Iterator<Item = &'a Located<Token>> + Clone {}

impl<'a, I> TokenStream<'a> for I where I: Iterator<Item = &'a Located<Token>> + Clone {}

pub fn parse<'a>(tokens: impl TokenStream<'a>, start: Location) -> Result<Ast, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.peekable(),
        last_known: start,
        lifetime_hack: PhantomData,
    };

    parser.program().map_err(Failure::coerce)
}

#[derive(Clone)]
struct Parser<'a, I: TokenStream<'a>> {
    tokens: Peekable<I>,
    last_known: Location,
    lifetime_hack: PhantomData<&'a ()>,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

impl<'a, I: TokenStream<'a>> Parser<'a, I> {
    fn program(&mut self) -> Parse<Ast> {
        let mut instructions = Vec::new();
        loop {
            while let Some(Token::Newline) = self.peek() {
                self.next()?;
            }

            if self.peek().is_none() {
                break Ok(Ast(instructions));
            }

            let address = instructions.len();
            instructions.push(self.instruction(address)?);
        }
    }

    fn instruction(&mut self, address: usize) -> Parse<Instruction> {
        let label = self.optional(Self::label_definition)?;

        let mut subinstructions = Vec::new();
        loop {
            if subinstructions.len() + label.iter().count() == MAX_SUBINSTRUCTIONS {
                self.next()?;
                return self.fail(StructuralError::TooManySubinstructions.into());
            }

            subinstructions.push(self.subinstruction()?);
            self.expect(Token::Semicolon)?;

            match self.peek() {
                None | Some(Token::Newline) => break,
                Some(_) => (),
            }
        }

        Ok(Instruction {
            label,
            address,
            subinstructions,
        })
    }

    fn label_definition(&mut self) -> Parse<Located<Identifier>> {
        let label = self.label().map_err(Failure::weak)?;
        self.expect(Token::Colon)?;

        Ok(label)
    }

    fn subinstruction(&mut self) -> Parse<Located<Subinstruction>> {
        let start = self.upcoming(Expected::Subinstruction)?;

        let subinstruction = match start.as_ref() {
            Token::Register(_) | Token::OpenParen => self.assignment()?,
            Token::Keyword(Keyword::Goto) => self.goto()?,
            Token::Keyword(Keyword::If) => self.conditional()?,

            Token::Keyword(Keyword::Rd) => {
                self.next()?;
                Subinstruction::ReadMem
            }

            Token::Keyword(Keyword::Wr) => {
                self.next()?;
                Subinstruction::WriteMem
            }

            Token::Keyword(Keyword::Halt) => {
                self.next()?;
                Subinstruction::Halt
            }

            Token::Label(label) => {
                self.next()?;
                return self.fail(StructuralError::MisplacedLabel(label.clone()).into());
            }

            found => {
                let found = found.clone();
                self.next()?;
                return self.fail(ParserError::UnexpectedToken(Expected::Subinstruction, found));
            }
        };

        let location = Location::span(start.location().clone(), &self.last_known);
        Ok(Located::at(subinstruction, location))
    }

    fn assignment(&mut self) -> Parse<Subinstruction> {
        let dest = self.register()?;
        self.expect(Token::Assign)?;
        let source = self.source()?;

        Ok(Subinstruction::Assign { dest, source })
    }

    fn goto(&mut self) -> Parse<Subinstruction> {
        self.keyword(Keyword::Goto)?;
        let target = self.label()?;

        Ok(Subinstruction::Goto { target })
    }

    fn conditional(&mut self) -> Parse<Subinstruction> {
        self.keyword(Keyword::If)?;

        let condition = match self.next()?.into_inner() {
            Token::Keyword(Keyword::N) => Condition::Negative,
            Token::Keyword(Keyword::Z) => Condition::Zero,
            found => return self.fail(ParserError::UnexpectedToken(Expected::Condition, found)),
        };

        self.keyword(Keyword::Then)?;
        self.keyword(Keyword::Goto)?;
        let target = self.label()?;

        Ok(Subinstruction::If { condition, target })
    }

    fn source(&mut self) -> Parse<Located<Expr>> {
        let start = self.upcoming(Expected::Source)?;

        let expr = match start.as_ref() {
            Token::Keyword(keyword @ (Keyword::Band | Keyword::Lshift | Keyword::Rshift | Keyword::Inv)) => {
                let keyword = *keyword;
                self.next()?;
                self.parameterized(keyword)?
            }

            Token::Register(_) | Token::OpenParen => {
                let left = self.register()?;
                match self.addend()? {
                    Some(right) => Expr::Add(left, right),
                    None => Expr::Read(left),
                }
            }

            found => {
                let found = found.clone();
                self.next()?;
                return self.fail(ParserError::UnexpectedToken(Expected::Source, found));
            }
        };

        let location = Location::span(start.location().clone(), &self.last_known);
        Ok(Located::at(expr, location))
    }

    fn parameterized(&mut self, operation: Keyword) -> Parse<Expr> {
        self.expect(Token::OpenParen)?;

        let arity = |this: &mut Self, expected: usize| -> Parse<Expr> {
            this.next()?;
            this.fail(StructuralError::Arity { operation, expected }.into())
        };

        let left = self.register()?;
        let expr = match operation {
            Keyword::Band => {
                if let Some(Token::CloseParen) = self.peek() {
                    return arity(self, 2);
                }

                self.expect(Token::Comma)?;
                let right = self.register()?;
                Expr::And(left, right)
            }

            _ => {
                let operand = match self.addend()? {
                    Some(right) => Operand::Add(left, right),
                    None => Operand::Read(left),
                };

                let op = match operation {
                    Keyword::Lshift => UnaryOp::LeftShift,
                    Keyword::Rshift => UnaryOp::RightShift,
                    _ => UnaryOp::Invert,
                };

                Expr::Unary(op, operand)
            }
        };

        if let Some(Token::Comma) = self.peek() {
            let expected = if let Expr::And(..) = expr { 2 } else { 1 };
            return arity(self, expected);
        }

        self.expect(Token::CloseParen)?;
        Ok(expr)
    }

    /// Segundo sumando opcional, precedido por `+`.
    fn addend(&mut self) -> Parse<Option<Located<Register>>> {
        match self.optional(|s| s.expect(Token::Plus).map_err(Failure::weak))? {
            Some(()) => Ok(Some(self.register().map_err(Failure::strict)?)),
            None => Ok(None),
        }
    }

    /// Un registro, opcionalmente envuelto en paréntesis.
    fn register(&mut self) -> Parse<Located<Register>> {
        if let Some(Token::OpenParen) = self.peek() {
            self.next()?;
            let register = self.bare_register()?;
            self.expect(Token::CloseParen)?;

            Ok(register)
        } else {
            self.bare_register()
        }
    }

    fn bare_register(&mut self) -> Parse<Located<Register>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Register(register) => Ok(Located::at(register, location)),
            found => self.fail(ParserError::UnexpectedToken(Expected::Register, found)),
        }
    }

    fn label(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Label(label) => Ok(Located::at(label, location)),
            found => self.fail(ParserError::UnexpectedToken(Expected::Label, found)),
        }
    }

    fn optional<T, F>(&mut self, rule: F) -> Parse<Option<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        match self.attempt(rule) {
            Err(Failure::Weak(_)) => Ok(None),
            result => Ok(Some(result?)),
        }
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(Expected::Token(token), found)),
            Err(_) => self.fail(ParserError::MissingToken(Expected::Token(token))),
        }
    }

    /// Observa el siguiente token sin consumirlo, fallando si no existe.
    fn upcoming(&mut self, expected: Expected) -> Parse<Located<Token>> {
        match self.tokens.peek() {
            Some(token) => Ok((*token).clone()),
            None => self.fail(ParserError::MissingToken(expected)),
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(|token| token.as_ref())
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known.clone())))
    }
}
