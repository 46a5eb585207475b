//! Catálogo de registros.
//!
//! La microarquitectura expone un conjunto fijo de registros. El orden
//! de declaración en [`CATALOG`] determina el índice que se codifica en
//! los campos `A`, `B` y `C` de cada palabra de control, por lo cual este
//! orden jamás debe alterarse. Los campos de bus tienen cuatro bits, así
//! que solo los primeros dieciséis registros pueden circular por un bus;
//! `mar`, `mbr` y `alu` existen en el catálogo únicamente para efectos de
//! nombre y se acceden por líneas de control dedicadas.

use lazy_static::lazy_static;
use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// Descriptor estático de un registro.
struct Descriptor {
    name: &'static str,
    mutable: bool,
    readable: bool,
}

const fn reg(name: &'static str, mutable: bool, readable: bool) -> Descriptor {
    Descriptor {
        name,
        mutable,
        readable,
    }
}

#[rustfmt::skip]
static CATALOG: [Descriptor; 19] = [
    reg("pc",    true,  true),
    reg("ac",    true,  true),
    reg("sp",    true,  true),
    reg("ir",    true,  true),
    reg("tir",   true,  true),
    reg("0",     false, true),
    reg("1",     false, true),
    reg("-1",    false, true),
    reg("amask", false, true),
    reg("smask", false, true),
    reg("a",     true,  true),
    reg("b",     true,  true),
    reg("c",     true,  true),
    reg("d",     true,  true),
    reg("e",     true,  true),
    reg("f",     true,  true),
    reg("mar",   true,  false),
    reg("mbr",   true,  true),
    reg("alu",   true,  false),
];

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, Register> = CATALOG
        .iter()
        .enumerate()
        .map(|(index, descriptor)| (descriptor.name, Register(index as u8)))
        .collect();
}

/// Un registro del catálogo, identificado por su índice.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    pub const PC: Register = Register(0);
    pub const AC: Register = Register(1);
    pub const SP: Register = Register(2);
    pub const IR: Register = Register(3);
    pub const TIR: Register = Register(4);
    pub const ZERO: Register = Register(5);
    pub const ONE: Register = Register(6);
    pub const MINUS_ONE: Register = Register(7);
    pub const AMASK: Register = Register(8);
    pub const SMASK: Register = Register(9);
    pub const A: Register = Register(10);
    pub const B: Register = Register(11);
    pub const C: Register = Register(12);
    pub const D: Register = Register(13);
    pub const E: Register = Register(14);
    pub const F: Register = Register(15);

    /// Registro de dirección de memoria.
    ///
    /// Se carga desde el bus B por medio de su propia línea de escritura.
    pub const MAR: Register = Register(16);

    /// Registro de búfer de memoria.
    ///
    /// Se escribe por su propia línea y se lee únicamente a través
    /// del multiplexor `amux`, nunca desde un bus.
    pub const MBR: Register = Register(17);

    /// Pseudo-registro que descarta el resultado de la ALU.
    pub const ALU: Register = Register(18);

    /// Busca un registro por nombre exacto.
    pub fn from_name(name: &str) -> Option<Register> {
        BY_NAME.get(name).copied()
    }

    /// Itera sobre el catálogo completo en orden de índice.
    pub fn all() -> impl Iterator<Item = Register> {
        (0..CATALOG.len() as u8).map(Register)
    }

    /// Índice del registro, tal y como aparece en los campos de bus.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Nombre del registro en código fuente.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Determina si el registro puede ser destino de una asignación.
    pub fn is_mutable(self) -> bool {
        self.descriptor().mutable
    }

    /// Determina si el registro puede ser leído como operando.
    pub fn is_readable(self) -> bool {
        self.descriptor().readable
    }

    fn descriptor(self) -> &'static Descriptor {
        &CATALOG[self.0 as usize]
    }
}

impl Display for Register {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}
