//! Punto de entrada ("driver").
//!
//! Este módulo lee un microprograma, lo ensambla y escribe una palabra
//! de control por línea. También puede decodificar una palabra suelta
//! en sus campos.

use anyhow::{self, bail, Context};
use clap::{crate_version, Arg, Command};
use micasm::{
    assemble,
    error::Diagnostics,
    word::{ControlWord, Format},
};

use tracing_subscriber::EnvFilter;

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    str::FromStr,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parsing de CLI
    let args = Command::new("MIC-1 microassembler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .default_value("-")
                .help("Microprogram source ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .takes_value(true)
                .value_name("FORMAT")
                .default_value("binary")
                .possible_values(Format::NAMES)
                .help("Textual rendering of each control word"),
        )
        .arg(
            Arg::new("explain")
                .short('x')
                .long("explain")
                .help("List the fields of each control word"),
        )
        .arg(
            Arg::new("symbols")
                .long("symbols")
                .help("Print the label table to stderr"),
        )
        .arg(
            Arg::new("decode")
                .short('d')
                .long("decode")
                .takes_value(true)
                .value_name("WORD")
                .help("Decode a 32-bit binary control word and exit"),
        )
        .get_matches();

    if let Some(word) = args.value_of("decode") {
        let word = ControlWord::from_str(word)
            .with_context(|| format!("Not a control word: {}", word))?;

        print!("{}", word.fields());
        return Ok(());
    }

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("-");
    let explain = args.is_present("explain");
    let format = Format::from_str(args.value_of("format").unwrap_or("binary"))
        .ok()
        .context("main.rs allowed a bad format")?;

    let (text, name) = match input {
        "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;

            (text, "<stdin>")
        }

        path => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to open for reading: {}", path))?;

            (text, path)
        }
    };

    let assembly = match assemble(&text, name) {
        Ok(assembly) => assembly,
        Err(errors) => {
            eprint!("{}", Diagnostics::from(&errors[..]));
            bail!("Failed to assemble {}", name);
        }
    };

    if args.is_present("symbols") {
        for (label, address) in assembly.labels.iter() {
            eprintln!("{} {}", label, address);
        }
    }

    let words = &assembly.words;
    match output {
        "-" => {
            let stdout = io::stdout();
            write_words(&mut stdout.lock(), words, format, explain)
                .context("Failed to write to stdout")?;
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write_words(&mut file, words, format, explain)
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    }

    Ok(())
}

fn write_words<W: Write>(
    output: &mut W,
    words: &[ControlWord],
    format: Format,
    explain: bool,
) -> io::Result<()> {
    for &word in words {
        writeln!(output, "{}", format.render(word))?;
        if explain {
            writeln!(output, "{}", word.fields())?;
        }
    }

    output.flush()
}
