//! Flujo de control.
//!
//! Cada etiqueta es una acción dentro de un sistema de acciones. La
//! ejecución secuencial entre etiquetas se modela con llamadas explícitas:
//! al encontrar `etiqueta:` la acción en curso termina con
//! `CALL etiqueta` y se abre una acción nueva. La última acción de todo
//! sistema termina con `CALL Z`.
//!
//! Las etiquetas no distinguen mayúsculas de minúsculas, por lo que toda
//! acción y todo destino de salto se emiten en minúsculas. Así un salto
//! hacia adelante no necesita conocer la etiqueta de antemano.

use super::{Generator, Operand, Semantic};
use crate::output::Section;
use tracing::{debug, warn};

/// Número de interrupción de servicios DOS.
const DOS_INTERRUPT: i64 = 0x21;

/// Condición de un salto condicional.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Above,
    AboveOrEqual,
    Below,
    BelowOrEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Condition {
    /// Combinación de banderas equivalente.
    pub fn predicate(self) -> &'static str {
        use Condition::*;

        match self {
            Above => "flag_c = 0 AND flag_z = 0",
            AboveOrEqual => "flag_c = 0",
            Below => "flag_c = 1",
            BelowOrEqual => "flag_c = 1 OR flag_z = 1",
            Greater => "flag_z = 0 AND flag_s = flag_o",
            GreaterOrEqual => "flag_s = flag_o",
            Less => "flag_s <> flag_o",
            LessOrEqual => "flag_z = 1 OR flag_s <> flag_o",
            Equal => "flag_z = 1",
            NotEqual => "flag_z = 0",
        }
    }
}

/// Nombre de la acción que corresponde a una etiqueta.
fn action(label: &str) -> String {
    label.to_ascii_lowercase()
}

impl Generator {
    /// Abre el sistema de acciones principal.
    pub fn begin_main(&mut self) {
        self.output.set_section(Section::Body);
        self.begin_actions();
        self.output.mark_main();
    }

    /// Cierra el sistema de acciones en curso.
    pub fn end_actions(&mut self) {
        emit!(self.output, "CALL Z");
        emit!(self.output, "END");
        emit!(self.output, "ENDACTIONS");
    }

    /// Abre la definición de un procedimiento.
    pub fn begin_procedure(&mut self, name: &str) {
        debug!("Procedure `{}`", name);

        self.output.set_section(Section::Procedures);
        emit!(self.output, "PROC {}() ==", name);
        self.begin_actions();
    }

    pub fn end_procedure(&mut self) {
        self.end_actions();
        emit!(self.output, "END");
        self.output.set_section(Section::Body);
    }

    /// Termina la acción en curso y abre la de una etiqueta.
    pub fn label(&mut self, name: &str) {
        let action = action(name);
        emit!(self.output, "CALL {}", action);
        emit!(self.output, "END");
        emit!(self.output, "{} ==", action);
    }

    pub fn jump(&mut self, target: &str) {
        emit!(self.output, "CALL {};", action(target));
    }

    pub fn jump_if(&mut self, condition: Condition, target: &str) {
        emit!(
            self.output,
            "IF {} THEN CALL {} FI;",
            condition.predicate(),
            action(target)
        );
    }

    /// `loop`: decrementa `cx` módulo 2**16 y salta si no es cero.
    pub fn repeat(&mut self, target: &str) {
        emit!(self.output, "cx := (cx + 65535) MOD 65536;");
        emit!(self.output, "IF cx <> 0 THEN CALL {} FI;", action(target));
    }

    pub fn call(&mut self, procedure: &str) {
        emit!(self.output, "{}();", procedure);
    }

    /// Llamada al procedimiento de entrada, antes de todo el flujo principal.
    pub fn entry(&mut self, procedure: &str) {
        self.output.line_at_main(format_args!("{}();", procedure));
    }

    /// `int`. Solo se modela `int 21h` con las funciones 02h y 4Ch.
    pub fn interrupt(&mut self, number: &Operand) -> Semantic<()> {
        match number {
            Operand::Immediate(DOS_INTERRUPT) => {
                emit!(self.output, "temp := ax DIV 256;");
                emit!(self.output, "IF temp = 2 THEN");
                emit!(self.output, "PRINT(@ASCII_To_String(dx MOD 256))");
                emit!(self.output, "ELSIF temp = 76 THEN");
                emit!(self.output, "CALL Z");
                emit!(self.output, "FI;");
            }

            other => debug!("Interrupt {:?} has no effect", other),
        }

        Ok(())
    }

    /// Instrucciones reconocidas pero sin traducción.
    pub fn ignore(&mut self, mnemonic: &str) {
        warn!("`{}` is not translated and has no effect", mnemonic);
    }

    fn begin_actions(&mut self) {
        emit!(self.output, "ACTIONS beg:");
        emit!(self.output, "beg ==");
    }
}
