//! Rastreo de ubicaciones en el microprograma fuente.
//!
//! Tokens, subinstrucciones y errores del ensamblador recuerdan el rango
//! línea-columna del texto del cual provienen. Un microprograma siempre
//! se ensambla desde memoria, por lo cual [`Source`] conserva el texto
//! completo y los diagnósticos pueden citar cualquier línea.
//!
//! Cada carácter ocupa exactamente una columna, tabuladores incluidos.

use std::{
    fmt::{self, Debug, Display, Formatter},
    iter,
    rc::Rc,
};

/// Flujo de caracteres. Cada carácter viaja junto a la ubicación del
/// carácter que le sigue.
pub trait InputStream: Iterator<Item = (char, Location)> {}

impl<I> InputStream for I where I: Iterator<Item = (char, Location)> {}

/// Un valor con la ubicación de donde proviene.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Separa ubicación y valor.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Rango cerrado de posiciones dentro de un [`Source`].
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    first: Position,
    last: Position,
}

impl Location {
    fn point(source: Rc<Source>, position: Position) -> Self {
        Location {
            source,
            first: position,
            last: position,
        }
    }

    /// Rango desde el inicio de `from` hasta el final de `to`.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            last: to.last,
            ..from
        }
    }

    /// Primera posición cubierta.
    pub fn start(&self) -> Position {
        self.first
    }

    /// Última posición cubierta, inclusive.
    pub fn end(&self) -> Position {
        self.last
    }

    pub fn source(&self) -> &Source {
        &self.source
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.source.name)?;

        if self.first == self.last {
            write!(formatter, "{}", self.first)
        } else {
            write!(formatter, "[{}-{}]", self.first, self.last)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Posición línea-columna, ambas a partir de 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    const FIRST: Position = Position { line: 1, column: 1 };

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    fn after(self, c: char) -> Position {
        match c {
            '\n' => Position {
                line: self.line + 1,
                column: 1,
            },

            _ => Position {
                line: self.line,
                column: self.column + 1,
            },
        }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Prepara un texto fuente para el lexer.
///
/// La ubicación retornada corresponde al primer carácter. Toda línea,
/// incluida la última, termina en `'\n'` dentro del flujo, y los finales
/// `"\r\n"` se reducen a `'\n'`.
pub fn consume<'a>(text: &'a str, name: &str) -> (Location, impl InputStream + 'a) {
    let source = Rc::new(Source {
        name: name.to_owned(),
        text: text.to_owned(),
    });

    let start = Location::point(Rc::clone(&source), Position::FIRST);
    let chars = text
        .lines()
        .flat_map(|line| line.chars().chain(iter::once('\n')))
        .scan(Position::FIRST, move |position, c| {
            *position = position.after(c);
            Some((c, Location::point(Rc::clone(&source), *position)))
        });

    (start, chars)
}

/// Nombre y texto de un microprograma.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contenido de la línea `number`, sin su terminador. Una línea
    /// inexistente se observa como vacía.
    pub fn line(&self, number: u32) -> &str {
        (number as usize)
            .checked_sub(1)
            .and_then(|index| self.text.lines().nth(index))
            .unwrap_or("")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn each_char_carries_the_next_position() {
        let (start, stream) = consume("ab\r\n\tc", "<test>");
        assert_eq!(start.to_string(), "<test>:1:1");

        let after: Vec<_> = stream
            .map(|(c, location)| (c, location.start().line(), location.start().column()))
            .collect();

        assert_eq!(
            after,
            vec![
                ('a', 1, 2),
                ('b', 1, 3),
                ('\n', 2, 1),
                ('\t', 2, 2),
                ('c', 2, 3),
                ('\n', 3, 1),
            ]
        );
    }

    #[test]
    fn spans_and_lines() {
        let (start, stream) = consume("rd;\nac := mar;", "prog.mal");
        let locations: Vec<_> = stream.map(|(_, location)| location).collect();

        assert_eq!(Location::span(start.clone(), &start).to_string(), "prog.mal:1:1");
        assert_eq!(
            Location::span(locations[3].clone(), &locations[11]).to_string(),
            "prog.mal:[2:1-2:9]"
        );

        let source = start.source();
        assert_eq!(source.name(), "prog.mal");
        assert_eq!(source.line(2), "ac := mar;");
        assert_eq!(source.line(0), "");
        assert_eq!(source.line(7), "");
    }
}
