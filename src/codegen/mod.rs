//! Generación de palabras de control.
//!
//! Segunda pasada de generación de código. Cada instrucción parte de un
//! [`Resources`] vacío, sus subinstrucciones se pliegan de izquierda a
//! derecha sobre ese estado y el resultado se empaqueta en una
//! [`ControlWord`]. El proceso se detiene en el primer conflicto.

use tracing::trace;

use crate::{
    lex::Identifier,
    parse::{Ast, Condition, Expr, Instruction, Operand, Subinstruction, UnaryOp},
    regs::Register,
    semantic::LabelTable,
    source::Located,
    word::ControlWord,
};

mod alloc;

pub use self::alloc::{AluOp, Bus, ConflictError, Jump, Resources, ShiftOp};

/// Genera una palabra por instrucción, en orden de dirección.
///
/// Se asume que `labels` resultó de [`Ast::resolve`] sobre el mismo
/// árbol, por lo cual toda referencia a etiqueta existe y cabe en 8 bits.
pub fn emit(ast: &Ast, labels: &LabelTable) -> Result<Vec<ControlWord>, Located<ConflictError>> {
    ast.instructions()
        .iter()
        .map(|instruction| {
            let word = encode(instruction, labels)?;
            trace!(address = instruction.address(), %word, "packed");

            Ok(word)
        })
        .collect()
}

fn encode(instruction: &Instruction, labels: &LabelTable) -> Result<ControlWord, Located<ConflictError>> {
    let mut resources = Resources::default();

    for subinstruction in instruction.subinstructions() {
        let at = |error: ConflictError| Located::at(error, subinstruction.location().clone());

        match subinstruction.as_ref() {
            Subinstruction::Halt => return Ok(ControlWord::HALT),
            Subinstruction::ReadMem => resources.read().map_err(at)?,
            Subinstruction::WriteMem => resources.write().map_err(at)?,

            Subinstruction::Goto { target } => resources
                .branch(Jump::Always, address(labels, target))
                .map_err(at)?,

            Subinstruction::If { condition, target } => {
                let condition = match condition {
                    Condition::Negative => Jump::Negative,
                    Condition::Zero => Jump::Zero,
                };

                resources
                    .branch(condition, address(labels, target))
                    .map_err(at)?
            }

            Subinstruction::Assign { dest, source } => {
                if !dest.as_ref().is_mutable() {
                    let error = ConflictError::Immutable(*dest.as_ref());
                    return Err(Located::at(error, dest.location().clone()));
                }

                assign(&mut resources, *dest.as_ref(), source.as_ref()).map_err(at)?
            }
        }
    }

    Ok(resources.finish())
}

/// Pliega una asignación sobre el estado de recursos.
///
/// Cada fuente reclama solo las unidades que realmente utiliza. Una
/// lectura simple pasa por la ALU sin desplazamiento, un desplazamiento
/// de un solo registro deja la ALU libre y el resto de operaciones no
/// toca el desplazador.
fn assign(resources: &mut Resources, dest: Register, source: &Expr) -> Result<(), ConflictError> {
    if dest == Register::MAR {
        return match source {
            Expr::Read(register) => resources.load_mar(*register.as_ref()),
            _ => Err(ConflictError::MarSource),
        };
    }

    match source {
        Expr::Read(register) => {
            resources.route_a(*register.as_ref())?;
            resources.claim_alu(AluOp::Pass)?;
            resources.claim_shifter(ShiftOp::None)?;
        }

        Expr::Add(left, right) => {
            resources.add(*left.as_ref(), *right.as_ref())?;
            resources.claim_alu(AluOp::Add)?;
        }

        Expr::And(left, right) => {
            resources.route_a(*left.as_ref())?;
            resources.route_b(*right.as_ref())?;
            resources.claim_alu(AluOp::And)?;
        }

        Expr::Unary(op, operand) => {
            match operand {
                Operand::Read(register) => resources.route_a(*register.as_ref())?,
                Operand::Add(left, right) => {
                    resources.add(*left.as_ref(), *right.as_ref())?;
                    resources.claim_alu(AluOp::Add)?;
                }
            }

            match op {
                UnaryOp::LeftShift => resources.claim_shifter(ShiftOp::Left)?,
                UnaryOp::RightShift => resources.claim_shifter(ShiftOp::Right)?,

                // Sobre una suma, choca con la ALU ya ocupada
                UnaryOp::Invert => resources.claim_alu(AluOp::Invert)?,
            }
        }
    }

    resources.claim_output(dest)
}

fn address(labels: &LabelTable, target: &Located<Identifier>) -> u8 {
    labels
        .address(target.as_ref())
        .and_then(|address| u8::try_from(address).ok())
        .expect("label resolution let through a bad target")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lex::Lexer, parse, source};
    use pretty_assertions::assert_eq;

    fn emit_str(text: &str) -> Result<Vec<u32>, Located<ConflictError>> {
        let (start, stream) = source::consume(text, "<test>");
        let tokens = Lexer::new(start.clone(), stream)
            .tokenize()
            .expect("lexing failed");

        let ast = parse::parse(tokens.iter(), start).expect("parsing failed");
        let labels = ast.resolve().expect("label resolution failed");

        emit(&ast, &labels).map(|words| words.into_iter().map(u32::from).collect())
    }

    fn word(text: &str) -> u32 {
        emit_str(text).expect("conflict")[0]
    }

    fn conflict(text: &str) -> ConflictError {
        emit_str(text).expect_err("should conflict").into_inner()
    }

    #[test]
    fn assignments() {
        assert_eq!(word("ac := ac + 1;"), 0x0011_6100);
        assert_eq!(word("sp := sp + (-1);"), 0x0012_7200);
        assert_eq!(word("ir := mbr;"), 0x9013_0000);
        assert_eq!(word("a := inv(mbr);"), 0x981A_0000);
        assert_eq!(word("ac := mbr + ac;"), 0x8011_1000);
        assert_eq!(word("tir := lshift(ir + ir);"), 0x0414_3300);
    }

    #[test]
    fn single_register_inversion() {
        assert_eq!(word("a := inv(a);"), 0x181A_0A00);
        assert_eq!(word("a := inv(a); alu := inv(a);"), 0x181A_0A00);
    }

    #[test]
    fn single_register_shift_leaves_alu_unset() {
        assert_eq!(word("tir := lshift(tir);"), 0x0414_0400);
        assert_eq!(word("tir := rshift(tir);"), 0x0214_0400);

        let fields = ControlWord::from(word("tir := lshift(tir);")).fields();
        assert_eq!((fields.alu, fields.sh), (0, 2));
    }

    #[test]
    fn only_shifts_claim_the_shifter() {
        assert_eq!(word("a := a + b; a := lshift(a + b);"), 0x041A_BA00);
        assert_eq!(word("alu := band(a, b); c := rshift(a);"), 0x0A1C_BA00);
        assert_eq!(word("a := inv(b); a := lshift(b);"), 0x1C1A_0B00);
        assert!(matches!(conflict("a := b; a := lshift(b);"), ConflictError::Shifter { .. }));
    }

    #[test]
    fn memory_address_path() {
        assert_eq!(word("mar := pc; rd;"), 0x00C0_0000);
        assert_eq!(word("mar := sp; sp := sp + 1; rd;"), 0x00D2_2600);
        assert_eq!(word("tir := a + b; mar := b;"), 0x0094_BA00);
    }

    #[test]
    fn branches() {
        assert_eq!(word("0: pc := band(ir, amask); goto 0;"), 0x6810_8300);
        assert_eq!(word("0: alu := tir; if n then goto 0;"), 0x3000_0400);
        assert_eq!(emit_str("goto foo;\nfoo: rd;").unwrap(), vec![0x6000_0001, 0x0040_0000]);
    }

    #[test]
    fn halt_overrides_everything() {
        assert_eq!(word("halt;"), u32::MAX);
        assert_eq!(word("ac := ac + 1; halt; rd;"), u32::MAX);
    }

    #[test]
    fn mbr_write_line() {
        assert_eq!(word("mbr := ac;"), 0x1100_0100);
    }

    #[test]
    fn conflicts() {
        assert!(matches!(conflict("rd; wr;"), ConflictError::ReadWrite));
        assert!(matches!(conflict("x: goto x; goto x;"), ConflictError::JumpDefined));
        assert!(matches!(conflict("0 := ac;"), ConflictError::Immutable(Register::ZERO)));
        assert!(matches!(conflict("ac := mar;"), ConflictError::Unreadable(Register::MAR)));
        assert!(matches!(conflict("ac := ac + 1; sp := ac + 1;"), ConflictError::OutputTaken { .. }));
        assert!(matches!(conflict("a := b; mbr := d;"), ConflictError::Bus { bus: Bus::A, .. }));
        assert!(matches!(conflict("a := inv(b + c);"), ConflictError::Alu { .. }));
        assert!(matches!(conflict("a := lshift(b); c := rshift(b);"), ConflictError::Shifter { .. }));
        assert!(matches!(conflict("mar := mbr;"), ConflictError::MbrOnBBus));
        assert!(matches!(conflict("a := band(b, mbr);"), ConflictError::MbrOnBBus));
        assert!(matches!(conflict("mar := a + b;"), ConflictError::MarSource));
        assert!(matches!(conflict("ir := mbr; alu := tir;"), ConflictError::Bus { bus: Bus::A, .. }));
    }

    #[test]
    fn conflict_location() {
        let error = emit_str("rd;\nac := ac + 1; rd; wr;").expect_err("should conflict");
        assert_eq!(error.location().start().line(), 2);
        assert_eq!(error.location().start().column(), 19);

        let error = emit_str("-1 := ac;").expect_err("should conflict");
        assert_eq!(error.location().start().column(), 1);
    }
}
