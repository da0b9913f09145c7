//! Punto de entrada ("driver").
//!
//! Este módulo expone una CLI sobre [`asm2wsl::translate_with`]: lee un
//! archivo fuente, lo traduce y escribe el programa WSL resultante.

use anyhow::{self, bail, Context};
use asm2wsl::{config::Config, error::Diagnostic};
use clap::{self, crate_version, Arg, Command};
use tracing::Level;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("asm2wsl")
        .version(crate_version!())
        .about("Translates 8086 assembly into WSL action systems")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Assembly source file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file ('-' for stdout), defaults to the input with a .wsl extension"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .takes_value(true)
                .value_name("LEVEL")
                .default_value("warn")
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .help("Verbosity of diagnostics written to stderr"),
        )
        .arg(
            Arg::new("data-pointer")
                .long("data-pointer")
                .takes_value(true)
                .value_name("N")
                .help("Fixed value for @data and offset references"),
        )
        .get_matches();

    // Se extraen argumentos necesarios
    let level = args.value_of("log-level").unwrap_or("warn");
    let level = Level::from_str(level).context("Bad log level")?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::default();
    if let Some(pointer) = args.value_of("data-pointer") {
        let pointer = pointer
            .parse()
            .with_context(|| format!("Bad data pointer: {}", pointer))?;

        config = config.with_data_pointer(pointer);
    }

    let input = args.value_of("input").context("Missing input file")?;
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read source file: {}", input))?;

    let program = match asm2wsl::translate_with(source.as_bytes(), &config) {
        Ok(program) => program,
        Err(error) => {
            eprint!("{}", Diagnostic::new(input, &source, &error));
            bail!("Translation of {} failed", input);
        }
    };

    match args.value_of("output") {
        // Salida a stdout
        Some("-") => {
            let mut stdout = io::stdout();
            stdout
                .write_all(program.as_bytes())
                .context("Failed to write to stdout")?;
        }

        // Salida a archivo
        path => {
            let path = path.map_or_else(|| default_output(input), PathBuf::from);
            fs::write(&path, program)
                .with_context(|| format!("Failed to write to file: {}", path.display()))?;
        }
    }

    Ok(())
}

fn default_output(input: &str) -> PathBuf {
    Path::new(input).with_extension("wsl")
}
