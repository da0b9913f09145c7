//! Búfer de salida diferida.
//!
//! El programa WSL no se genera en el mismo orden en que se recorre la
//! fuente: las declaraciones de variables deben preceder a todo código y
//! los procedimientos se definen después del cuerpo principal. Por tanto
//! la salida se acumula en tres regiones independientes que solo se
//! ensamblan al final, en [`Output::finish()`].

use std::fmt;

/// Registros y banderas que todo programa declara, inicializados en cero.
const INITIAL_DECLARATIONS: &[&str] = &[
    "flag_o", "flag_s", "flag_z", "flag_c", "ax", "bx", "cx", "dx", "temp", "si", "di", "bp",
    "sp", "cs", "ds", "ss", "es",
];

/// Región que recibe sentencias.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Section {
    /// Sistema de acciones principal.
    Body,

    /// Definiciones de procedimientos, tras `WHERE`.
    Procedures,
}

/// Salida en construcción.
pub struct Output {
    declarations: Vec<String>,
    body: String,
    procedures: String,
    section: Section,

    /// Inicio de las sentencias del sistema principal dentro de `body`.
    main: usize,
}

impl Output {
    pub fn new() -> Self {
        let declarations = INITIAL_DECLARATIONS
            .iter()
            .map(|name| format!("{} := 0", name))
            .collect();

        Output {
            declarations,
            body: String::new(),
            procedures: String::new(),
            section: Section::Body,
            main: 0,
        }
    }

    /// Agrega una variable inicializada.
    pub fn declare(&mut self, name: &str, init: &str) {
        self.declarations.push(format!("{} := {}", name, init));
    }

    /// Cambia la región que reciben las siguientes líneas.
    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    /// Marca el punto actual del cuerpo como inicio del sistema principal.
    pub fn mark_main(&mut self) {
        self.main = self.body.len();
    }

    /// Antepone una línea a las sentencias del sistema principal.
    pub fn line_at_main(&mut self, args: fmt::Arguments<'_>) {
        self.body.insert_str(self.main, &format!("{}\n", args));
    }

    /// Emite una línea en la región actual.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let region = match self.section {
            Section::Body => &mut self.body,
            Section::Procedures => &mut self.procedures,
        };

        region.push_str(&args.to_string());
        region.push('\n');
    }

    /// Ensambla el programa final.
    ///
    /// El cuerpo queda envuelto en `BEGIN ... WHERE ... END` únicamente si
    /// existen procedimientos. Se elimina todo `;` que quede justo antes
    /// de una línea que cierra un bloque (`END`, `ENDACTIONS`, `ENDVAR`).
    pub fn finish(self) -> String {
        let Output {
            declarations,
            body,
            procedures,
            ..
        } = self;

        let mut program = format!("VAR < {} >:\n", declarations.join(",\n      "));
        if procedures.is_empty() {
            program.push_str(&body);
        } else {
            program.push_str("BEGIN\n");
            program.push_str(&body);
            program.push_str("WHERE\n");
            program.push_str(&procedures);
            program.push_str("END\n");
        }

        program.push_str("ENDVAR\n");
        strip_separators(&program)
    }
}

impl Default for Output {
    fn default() -> Self {
        Output::new()
    }
}

/// Remueve separadores de sentencia previos a una palabra de cierre.
fn strip_separators(program: &str) -> String {
    let lines: Vec<&str> = program.lines().collect();
    let mut stripped = String::with_capacity(program.len());

    for (index, line) in lines.iter().enumerate() {
        let closes = lines
            .get(index + 1)
            .map_or(false, |next| matches!(next.trim(), "END" | "ENDACTIONS" | "ENDVAR"));

        match line.strip_suffix(';') {
            Some(statement) if closes => stripped.push_str(statement),
            _ => stripped.push_str(line),
        }

        stripped.push('\n');
    }

    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_independent() {
        let mut output = Output::new();
        emit!(output, "beg ==");
        output.set_section(Section::Procedures);
        emit!(output, "PROC p() ==");
        output.set_section(Section::Body);
        emit!(output, "ax := 1;");
        output.set_section(Section::Procedures);
        emit!(output, "SKIP");
        output.set_section(Section::Body);
        emit!(output, "CALL Z");

        let program = output.finish();
        let body = program.find("beg ==").unwrap();
        let assignment = program.find("ax := 1").unwrap();
        let procedure = program.find("PROC p() ==").unwrap();
        let exit = program.find("CALL Z").unwrap();

        assert!(body < assignment && assignment < exit && exit < procedure);
        assert!(program.contains("BEGIN\n") && program.contains("WHERE\n"));
    }

    #[test]
    fn separators_before_closers_are_removed() {
        let mut output = Output::new();
        emit!(output, "ax := 1;");
        emit!(output, "END");
        emit!(output, "bx := 2;");
        emit!(output, "cx := 3;");

        let program = output.finish();
        assert!(program.contains("ax := 1\nEND\n"));
        assert!(program.contains("bx := 2;\ncx := 3\nENDVAR\n"));
    }

    #[test]
    fn lines_can_be_placed_before_main_statements() {
        let mut output = Output::new();
        emit!(output, "beg ==");
        output.mark_main();
        emit!(output, "ax := 1;");
        output.line_at_main(format_args!("main();"));

        assert!(output.finish().contains("beg ==\nmain();\nax := 1\nENDVAR\n"));
    }

    #[test]
    fn names_starting_with_end_keep_separators() {
        let mut output = Output::new();
        emit!(output, "ax := 1;");
        emit!(output, "ENDVAL := ax;");
        emit!(output, "ENDACTIONS");

        let program = output.finish();
        assert!(program.contains("ax := 1;\nENDVAL := ax\nENDACTIONS\n"));
    }

    #[test]
    fn declarations_start_with_flags_and_registers() {
        let mut output = Output::new();
        output.declare("x", "10");

        let program = output.finish();
        assert!(program.starts_with("VAR < flag_o := 0,"));
        assert!(program.contains("es := 0,\n      x := 10 >:\n"));
        assert!(!program.contains("BEGIN"));
    }
}
