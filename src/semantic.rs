//! Resolución de etiquetas.
//!
//! Primera pasada de generación de código. Se recorre el programa una
//! vez para asociar cada etiqueta definida con la dirección de su
//! instrucción y para recolectar todas las referencias de `goto` e `if`.
//! A diferencia de las fases anteriores, los errores de esta pasada se
//! acumulan: un mismo programa puede reportar varias definiciones
//! duplicadas junto a la lista completa de etiquetas inexistentes.

use thiserror::Error;

use std::collections::{hash_map::Entry, HashMap};

use crate::{
    lex::Identifier,
    parse::{Ast, Subinstruction},
    source::{Located, Location},
};

/// Cantidad de direcciones que puede codificar el campo `ADDR`.
pub const ADDRESS_SPACE: usize = 256;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Label `{label}` is already defined at {first}")]
    Duplicate { label: Identifier, first: Location },

    #[error("Undefined label(s): {}", join(.0))]
    Undefined(Vec<Identifier>),

    #[error("Label `{0}` resolves to address {1}, which does not fit in 8 bits")]
    OutOfRange(Identifier, usize),
}

fn join(labels: &[Identifier]) -> String {
    labels
        .iter()
        .map(|label| format!("`{}`", label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Asociación de nombres de etiqueta a direcciones de instrucción.
#[derive(Debug, Default)]
pub struct LabelTable {
    addresses: HashMap<Identifier, usize>,
    order: Vec<Identifier>,
}

impl LabelTable {
    /// Dirección de una etiqueta, si existe.
    pub fn address(&self, label: &Identifier) -> Option<usize> {
        self.addresses.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Itera en orden de dirección.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, usize)> {
        self.order
            .iter()
            .map(move |label| (label, self.addresses[label]))
    }

    fn insert(&mut self, label: Identifier, address: usize) {
        self.order.push(label.clone());
        self.addresses.insert(label, address);
    }
}

impl Ast {
    /// Construye la tabla de etiquetas y verifica cada referencia.
    pub fn resolve(&self) -> Result<LabelTable, Vec<Located<LabelError>>> {
        let mut table = LabelTable::default();
        let mut definitions: HashMap<&Identifier, &Location> = HashMap::new();
        let mut errors = Vec::new();

        for instruction in self.instructions() {
            let label = match instruction.label() {
                Some(label) => label,
                None => continue,
            };

            match definitions.entry(label.as_ref()) {
                Entry::Vacant(entry) => {
                    entry.insert(label.location());
                    table.insert(label.as_ref().clone(), instruction.address());
                }

                Entry::Occupied(first) => {
                    let error = LabelError::Duplicate {
                        label: label.as_ref().clone(),
                        first: (*first.get()).clone(),
                    };

                    errors.push(Located::at(error, label.location().clone()));
                }
            }
        }

        let mut missing: Vec<&Located<Identifier>> = Vec::new();
        for target in self.targets() {
            match table.address(target.as_ref()) {
                None if !missing.iter().any(|known| known.as_ref() == target.as_ref()) => {
                    missing.push(target);
                }

                Some(address) if address >= ADDRESS_SPACE => {
                    let error = LabelError::OutOfRange(target.as_ref().clone(), address);
                    errors.push(Located::at(error, target.location().clone()));
                }

                _ => (),
            }
        }

        if let Some(first) = missing.first() {
            let names = missing.iter().map(|label| label.as_ref().clone()).collect();
            errors.push(Located::at(
                LabelError::Undefined(names),
                first.location().clone(),
            ));
        }

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    /// Todas las referencias a etiquetas, en orden de aparición.
    fn targets(&self) -> impl Iterator<Item = &Located<Identifier>> {
        self.instructions()
            .iter()
            .flat_map(|instruction| instruction.subinstructions())
            .filter_map(|subinstruction| match subinstruction.as_ref() {
                Subinstruction::Goto { target } => Some(target),
                Subinstruction::If { target, .. } => Some(target),
                _ => None,
            })
    }
}
