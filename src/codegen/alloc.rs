//! Asignación de recursos por instrucción.
//!
//! Un [`Resources`] registra qué registro ocupa cada bus, qué operación
//! realizan la ALU y el desplazador, qué líneas de control se activan y
//! cuál es la decisión de salto de la instrucción en curso. Toda
//! reclamación de un recurso es idempotente: volver a pedir exactamente
//! lo mismo no es un conflicto, pedir algo distinto sí lo es.

use bitflags::bitflags;
use thiserror::Error;
use tracing::trace;

use std::fmt::{self, Display};

use crate::{
    regs::Register,
    word::{ControlWord, Fields},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("Memory read and write in the same cycle")]
    ReadWrite,

    #[error("Register `{0}` is read-only")]
    Immutable(Register),

    #[error("Register `{0}` cannot be read")]
    Unreadable(Register),

    #[error("Output path already writes `{taken}`, cannot also write `{wanted}`")]
    OutputTaken { wanted: Register, taken: Register },

    #[error("{bus} already carries `{taken}`, cannot also carry `{wanted}`")]
    Bus {
        bus: Bus,
        wanted: Register,
        taken: Register,
    },

    #[error("ALU already performs {taken}, cannot also perform {wanted}")]
    Alu { wanted: AluOp, taken: AluOp },

    #[error("Shifter already performs {taken}, cannot also perform {wanted}")]
    Shifter { wanted: ShiftOp, taken: ShiftOp },

    #[error("Jump condition already defined for this instruction")]
    JumpDefined,

    #[error("`mbr` reaches the ALU through the A multiplexer only, never through the B bus")]
    MbrOnBBus,

    #[error("`mar` can only be loaded from a plain register")]
    MarSource,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    A,
    B,
}

impl Display for Bus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::A => fmt.write_str("A bus"),
            Bus::B => fmt.write_str("B bus"),
        }
    }
}

/// Operación de la ALU. El discriminante es su código en el campo `ALU`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add = 0,
    And = 1,
    Pass = 2,
    Invert = 3,
}

impl Display for AluOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AluOp::Add => "addition",
            AluOp::And => "bitwise and",
            AluOp::Pass => "pass-through",
            AluOp::Invert => "inversion",
        };

        fmt.write_str(name)
    }
}

/// Operación del desplazador. El discriminante es su código en el campo `SH`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    None = 0,
    Right = 1,
    Left = 2,
}

impl Display for ShiftOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShiftOp::None => "no shift",
            ShiftOp::Right => "a right shift",
            ShiftOp::Left => "a left shift",
        };

        fmt.write_str(name)
    }
}

/// Condición de salto. El discriminante es su código en el campo `COND`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Jump {
    Negative = 1,
    Zero = 2,
    Always = 3,
}

/// Contenido del bus A tras el multiplexor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Amux {
    Free,
    Bus(Register),
    Mbr,
}

impl Default for Amux {
    fn default() -> Self {
        Amux::Free
    }
}

bitflags! {
    /// Líneas de control de un bit.
    #[derive(Default)]
    struct Lines: u8 {
        /// Escritura de `mbr`.
        const MBR = 0x01;

        /// Escritura de `mar` desde el bus B.
        const MAR = 0x02;

        const RD = 0x04;
        const WR = 0x08;
    }
}

/// Estado de recursos de una instrucción.
#[derive(Debug, Default)]
pub struct Resources {
    a: Amux,
    b: Option<Register>,
    c: Option<Register>,
    lines: Lines,
    alu: Option<AluOp>,
    shifter: Option<ShiftOp>,
    branch: Option<(Jump, u8)>,
}

type Claim = Result<(), ConflictError>;

impl Resources {
    /// Coloca un operando en el bus A, o selecciona `mbr` en el multiplexor.
    pub fn route_a(&mut self, register: Register) -> Claim {
        readable(register)?;

        let wanted = if register == Register::MBR {
            Amux::Mbr
        } else {
            Amux::Bus(register)
        };

        match self.a {
            Amux::Free => self.a = wanted,
            taken if taken == wanted => (),

            Amux::Bus(taken) => return Err(bus_conflict(Bus::A, register, taken)),
            Amux::Mbr => return Err(bus_conflict(Bus::A, register, Register::MBR)),
        }

        Ok(())
    }

    pub fn route_b(&mut self, register: Register) -> Claim {
        readable(register)?;
        if register == Register::MBR {
            return Err(ConflictError::MbrOnBBus);
        }

        match self.b {
            None => self.b = Some(register),
            Some(taken) if taken == register => (),
            Some(taken) => return Err(bus_conflict(Bus::B, register, taken)),
        }

        Ok(())
    }

    /// Coloca los dos sumandos de una suma.
    ///
    /// `mbr` siempre entra por el multiplexor y el otro sumando por el
    /// bus B. En cualquier otro caso se intenta primero la colocación
    /// directa y luego la conmutada.
    pub fn add(&mut self, left: Register, right: Register) -> Claim {
        readable(left)?;
        readable(right)?;

        if left == Register::MBR {
            self.route_a(left)?;
            return self.route_b(right);
        } else if right == Register::MBR {
            self.route_a(right)?;
            return self.route_b(left);
        }

        if !(self.fits_a(left) && self.fits_b(right)) && self.fits_a(right) && self.fits_b(left) {
            trace!(%left, %right, "commuting addition");
            self.route_a(right)?;
            self.route_b(left)
        } else {
            self.route_a(left)?;
            self.route_b(right)
        }
    }

    pub fn claim_alu(&mut self, wanted: AluOp) -> Claim {
        match self.alu {
            None => self.alu = Some(wanted),
            Some(taken) if taken == wanted => (),
            Some(taken) => return Err(ConflictError::Alu { wanted, taken }),
        }

        Ok(())
    }

    pub fn claim_shifter(&mut self, wanted: ShiftOp) -> Claim {
        match self.shifter {
            None => self.shifter = Some(wanted),
            Some(taken) if taken == wanted => (),
            Some(taken) => return Err(ConflictError::Shifter { wanted, taken }),
        }

        Ok(())
    }

    /// Reclama la ruta de escritura de un destino de la ALU.
    ///
    /// `mbr` tiene su propia línea y `alu` no escribe en ningún lado.
    /// El resto de destinos se escriben por el bus C.
    pub fn claim_output(&mut self, dest: Register) -> Claim {
        if !dest.is_mutable() {
            return Err(ConflictError::Immutable(dest));
        }

        match dest {
            Register::MBR => self.lines.insert(Lines::MBR),
            Register::ALU => (),

            _ => match self.c {
                None => self.c = Some(dest),
                Some(taken) if taken == dest => (),
                Some(taken) => {
                    return Err(ConflictError::OutputTaken {
                        wanted: dest,
                        taken,
                    })
                }
            },
        }

        Ok(())
    }

    /// Carga `mar` desde el bus B.
    pub fn load_mar(&mut self, register: Register) -> Claim {
        self.route_b(register)?;
        self.lines.insert(Lines::MAR);

        Ok(())
    }

    pub fn read(&mut self) -> Claim {
        self.memory(Lines::RD, Lines::WR)
    }

    pub fn write(&mut self) -> Claim {
        self.memory(Lines::WR, Lines::RD)
    }

    pub fn branch(&mut self, condition: Jump, address: u8) -> Claim {
        match self.branch {
            None => self.branch = Some((condition, address)),
            Some(_) => return Err(ConflictError::JumpDefined),
        }

        Ok(())
    }

    /// Empaqueta el estado; todo campo no reclamado vale cero.
    pub fn finish(&self) -> ControlWord {
        let (cond, addr) = self
            .branch
            .map_or((0, 0), |(condition, address)| (condition as u8, address));

        let a = match self.a {
            Amux::Bus(register) => register.index(),
            Amux::Free | Amux::Mbr => 0,
        };

        let flag = |line| self.lines.contains(line) as u8;

        Fields {
            amux: (self.a == Amux::Mbr) as u8,
            cond,
            alu: self.alu.map_or(0, |op| op as u8),
            sh: self.shifter.map_or(0, |op| op as u8),
            mbr: flag(Lines::MBR),
            mar: flag(Lines::MAR),
            rd: flag(Lines::RD),
            wr: flag(Lines::WR),
            enc: self.c.is_some() as u8,
            c: self.c.map_or(0, Register::index),
            b: self.b.map_or(0, Register::index),
            a,
            addr,
        }
        .pack()
    }

    fn memory(&mut self, line: Lines, opposite: Lines) -> Claim {
        if self.lines.contains(opposite) {
            return Err(ConflictError::ReadWrite);
        }

        self.lines.insert(line);
        Ok(())
    }

    fn fits_a(&self, register: Register) -> bool {
        match self.a {
            Amux::Free => true,
            Amux::Bus(taken) => taken == register,
            Amux::Mbr => false,
        }
    }

    fn fits_b(&self, register: Register) -> bool {
        self.b.map_or(true, |taken| taken == register)
    }
}

fn readable(register: Register) -> Claim {
    if register.is_readable() {
        Ok(())
    } else {
        Err(ConflictError::Unreadable(register))
    }
}

fn bus_conflict(bus: Bus, wanted: Register, taken: Register) -> ConflictError {
    ConflictError::Bus { bus, wanted, taken }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_state_is_a_nop() {
        assert_eq!(Resources::default().finish().bits(), 0);
    }

    #[test]
    fn bus_reuse() {
        let mut resources = Resources::default();
        resources.route_a(Register::AC).unwrap();
        resources.route_a(Register::AC).unwrap();
        resources.route_b(Register::ONE).unwrap();
        resources.route_b(Register::ONE).unwrap();

        assert!(matches!(
            resources.route_a(Register::SP),
            Err(ConflictError::Bus {
                bus: Bus::A,
                wanted: Register::SP,
                taken: Register::AC
            })
        ));

        assert!(matches!(
            resources.route_b(Register::SP),
            Err(ConflictError::Bus { bus: Bus::B, .. })
        ));
    }

    #[test]
    fn addition_commutes() {
        let mut resources = Resources::default();
        resources.load_mar(Register::SP).unwrap();
        resources.add(Register::SP, Register::ONE).unwrap();

        let fields = resources.finish().fields();
        assert_eq!((fields.a, fields.b, fields.mar), (6, 2, 1));
    }

    #[test]
    fn addition_fails_both_ways() {
        let mut resources = Resources::default();
        resources.route_a(Register::A).unwrap();
        resources.route_b(Register::B).unwrap();

        assert!(resources.add(Register::C, Register::D).is_err());
        assert!(resources.add(Register::B, Register::A).is_ok());
    }

    #[test]
    fn mbr_goes_through_amux() {
        let mut resources = Resources::default();
        resources.add(Register::AC, Register::MBR).unwrap();

        let fields = resources.finish().fields();
        assert_eq!((fields.amux, fields.a, fields.b), (1, 0, 1));

        assert!(matches!(
            resources.route_a(Register::TIR),
            Err(ConflictError::Bus {
                bus: Bus::A,
                taken: Register::MBR,
                ..
            })
        ));

        assert!(matches!(
            resources.route_b(Register::MBR),
            Err(ConflictError::MbrOnBBus)
        ));
    }

    #[test]
    fn unreadable_sources() {
        let mut resources = Resources::default();
        assert!(matches!(
            resources.route_a(Register::MAR),
            Err(ConflictError::Unreadable(Register::MAR))
        ));

        assert!(matches!(
            resources.add(Register::A, Register::ALU),
            Err(ConflictError::Unreadable(Register::ALU))
        ));
    }

    #[test]
    fn functional_units_hold_one_operation() {
        let mut resources = Resources::default();
        resources.claim_alu(AluOp::Pass).unwrap();
        resources.claim_alu(AluOp::Pass).unwrap();
        resources.claim_shifter(ShiftOp::Left).unwrap();

        assert!(matches!(
            resources.claim_alu(AluOp::Add),
            Err(ConflictError::Alu {
                wanted: AluOp::Add,
                taken: AluOp::Pass
            })
        ));

        assert!(matches!(
            resources.claim_shifter(ShiftOp::Right),
            Err(ConflictError::Shifter {
                wanted: ShiftOp::Right,
                taken: ShiftOp::Left
            })
        ));
    }

    #[test]
    fn output_paths() {
        let mut resources = Resources::default();
        resources.claim_output(Register::AC).unwrap();
        resources.claim_output(Register::AC).unwrap();
        resources.claim_output(Register::MBR).unwrap();
        resources.claim_output(Register::ALU).unwrap();

        assert!(matches!(
            resources.claim_output(Register::SP),
            Err(ConflictError::OutputTaken {
                wanted: Register::SP,
                taken: Register::AC
            })
        ));

        assert!(matches!(
            resources.claim_output(Register::SMASK),
            Err(ConflictError::Immutable(Register::SMASK))
        ));

        let fields = resources.finish().fields();
        assert_eq!((fields.enc, fields.c, fields.mbr), (1, 1, 1));
    }

    #[test]
    fn memory_and_branches() {
        let mut resources = Resources::default();
        resources.read().unwrap();
        resources.read().unwrap();
        assert!(matches!(resources.write(), Err(ConflictError::ReadWrite)));

        resources.branch(Jump::Zero, 42).unwrap();
        assert!(matches!(
            resources.branch(Jump::Zero, 42),
            Err(ConflictError::JumpDefined)
        ));

        let fields = resources.finish().fields();
        assert_eq!((fields.rd, fields.wr, fields.cond, fields.addr), (1, 0, 2, 42));
    }
}
