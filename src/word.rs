//! Formato de palabras de control.
//!
//! Cada instrucción se codifica en una palabra de 32 bits compuesta por
//! trece campos de ancho fijo, dispuestos desde el bit más significativo:
//!
//! ```text
//! AMUX(1) COND(2) ALU(2) SH(2) MBR(1) MAR(1) RD(1) WR(1) ENC(1) C(4) B(4) A(4) ADDR(8)
//! ```

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

/// Nombre y ancho en bits de cada campo, en orden de empaquetado.
#[rustfmt::skip]
const LAYOUT: [(&str, u32); 13] = [
    ("AMUX", 1),
    ("COND", 2),
    ("ALU",  2),
    ("SH",   2),
    ("MBR",  1),
    ("MAR",  1),
    ("RD",   1),
    ("WR",   1),
    ("ENC",  1),
    ("C",    4),
    ("B",    4),
    ("A",    4),
    ("ADDR", 8),
];

const WORD_BITS: usize = 32;

/// Una palabra de control empaquetada.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ControlWord(u32);

impl ControlWord {
    /// Palabra de detención: todos los campos en su valor máximo.
    pub const HALT: ControlWord = ControlWord(u32::MAX);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Desempaqueta los campos individuales.
    pub fn fields(self) -> Fields {
        let mut values = [0; 13];
        let mut bits = self.0;

        for (value, &(_, width)) in values.iter_mut().zip(LAYOUT.iter()).rev() {
            *value = (bits & ((1 << width) - 1)) as u8;
            bits >>= width;
        }

        Fields::from_values(values)
    }
}

impl From<ControlWord> for u32 {
    fn from(word: ControlWord) -> u32 {
        word.0
    }
}

impl From<u32> for ControlWord {
    fn from(bits: u32) -> ControlWord {
        ControlWord(bits)
    }
}

impl Display for ControlWord {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:032b}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WordError {
    #[error("Expected {WORD_BITS} binary digits, found {0}")]
    Length(usize),

    #[error("Bad binary digit {0:?}")]
    Digit(char),
}

impl FromStr for ControlWord {
    type Err = WordError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let digits = string.trim();
        let digits = digits.strip_prefix("0b").unwrap_or(digits);

        let length = digits.chars().count();
        if length != WORD_BITS {
            return Err(WordError::Length(length));
        }

        digits
            .chars()
            .try_fold(0, |word: u32, c| match c {
                '0' => Ok(word << 1),
                '1' => Ok(word << 1 | 1),
                bad => Err(WordError::Digit(bad)),
            })
            .map(ControlWord)
    }
}

/// Campos de una palabra de control, sin empaquetar.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    pub amux: u8,
    pub cond: u8,
    pub alu: u8,
    pub sh: u8,
    pub mbr: u8,
    pub mar: u8,
    pub rd: u8,
    pub wr: u8,
    pub enc: u8,
    pub c: u8,
    pub b: u8,
    pub a: u8,
    pub addr: u8,
}

impl Fields {
    /// Empaqueta los campos en una palabra.
    ///
    /// # Panics
    /// Un valor que excede el ancho de su campo es un defecto del
    /// ensamblador y nunca un error de usuario.
    pub fn pack(&self) -> ControlWord {
        let bits = LAYOUT
            .iter()
            .zip(self.values())
            .fold(0, |word: u32, (&(name, width), value)| {
                let value = u32::from(value);
                assert!(
                    value < 1 << width,
                    "field {} overflows {} bits: {}",
                    name,
                    width,
                    value
                );

                word << width | value
            });

        ControlWord(bits)
    }

    fn values(&self) -> [u8; 13] {
        [
            self.amux, self.cond, self.alu, self.sh, self.mbr, self.mar, self.rd, self.wr,
            self.enc, self.c, self.b, self.a, self.addr,
        ]
    }

    fn from_values(values: [u8; 13]) -> Self {
        let [amux, cond, alu, sh, mbr, mar, rd, wr, enc, c, b, a, addr] = values;
        Fields {
            amux,
            cond,
            alu,
            sh,
            mbr,
            mar,
            rd,
            wr,
            enc,
            c,
            b,
            a,
            addr,
        }
    }
}

impl Display for Fields {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (&(name, width), value) in LAYOUT.iter().zip(self.values()) {
            writeln!(fmt, "{}:\t{:0width$b}", name, value, width = width as usize)?;
        }

        Ok(())
    }
}

/// Representación textual de palabras en la salida.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// 32 dígitos binarios.
    Binary,

    /// Igual que [`Format::Binary`], con prefijo `0b`.
    Literal,

    Hex,
    Decimal,
}

impl Format {
    pub const NAMES: [&'static str; 4] = ["binary", "literal", "hex", "decimal"];

    pub fn render(self, word: ControlWord) -> String {
        match self {
            Format::Binary => word.to_string(),
            Format::Literal => format!("0b{}", word),
            Format::Hex => format!("{:#010x}", word.bits()),
            Format::Decimal => word.bits().to_string(),
        }
    }
}

impl FromStr for Format {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "binary" => Ok(Format::Binary),
            "literal" => Ok(Format::Literal),
            "hex" => Ok(Format::Hex),
            "decimal" => Ok(Format::Decimal),
            _ => Err(()),
        }
    }
}
