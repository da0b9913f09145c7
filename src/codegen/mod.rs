//! Generación de código WSL.
//!
//! El [`Generator`] recibe operandos ya reconocidos por el parser y emite
//! las sentencias equivalentes en el búfer de salida. Toda instrucción se
//! traduce a asignaciones sobre variables de estado explícitas: los
//! registros de 16 bits, las banderas `flag_o`, `flag_s`, `flag_z`,
//! `flag_c` y la variable auxiliar `temp`. Los registros de 8 bits no
//! existen como variables; se leen y escriben a través de su registro
//! de 16 bits dueño.
//!
//! La lógica se reparte por familia de instrucciones en [`arith`],
//! [`moves`] y [`control`].

use crate::{
    config::Config,
    output::Output,
    symbols::{to_unsigned, Register, RegisterClass, Size, VariableTable},
};

use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hasher},
};

use thiserror::Error;
use tracing::{debug, warn};

mod arith;
mod control;
mod moves;

pub use arith::Operation;
pub use control::Condition;

/// Error de significado en una instrucción bien formada.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Undeclared variable `{0}`")]
    UndeclaredVariable(String),

    #[error("Variable `{0}` is already declared")]
    DuplicateVariable(String),

    #[error("Macro `{0}` is already defined")]
    DuplicateMacro(String),

    #[error("Macro `{0}` cannot invoke itself")]
    RecursiveMacro(String),

    #[error("Macro `{name}` expects {expected} arguments, found {found}")]
    MacroArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Operand size mismatch: {0} vs {1}")]
    SizeMismatch(Size, Size),

    #[error("Unsupported operand combination for `{0}`")]
    UnsupportedOperands(&'static str),

    #[error("Procedure `{expected}` is closed as `{found}`")]
    ProcedureNameMismatch { expected: String, found: String },
}

pub type Semantic<T> = Result<T, SemanticError>;

/// Argumento de una instrucción.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Register(Register),

    /// Variable, posiblemente indexada.
    ///
    /// `name` es el nombre base y `text` la referencia completa tal
    /// como se emitirá, por ejemplo `arr[bp + 2 + 1]`.
    Memory { name: String, text: String },

    Immediate(i64),

    /// `@data` u `offset variable`.
    Pointer,
}

impl Operand {
    /// Construye una referencia a variable sin indexado.
    pub fn variable<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        Operand::Memory {
            text: name.clone(),
            name,
        }
    }

    fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory { .. })
    }

    fn is_constant(&self) -> bool {
        matches!(self, Operand::Immediate(_) | Operand::Pointer)
    }
}

/// Estado de generación de una traducción.
pub struct Generator {
    output: Output,
    variables: VariableTable,
    config: Config,
    pointer: Option<i64>,
    stack: bool,
}

impl Generator {
    pub fn new(config: &Config) -> Self {
        Generator {
            output: Output::new(),
            variables: VariableTable::default(),
            config: config.clone(),
            pointer: None,
            stack: false,
        }
    }

    /// Cierra la traducción y produce el programa final.
    pub fn finish(self) -> String {
        self.output.finish()
    }

    /// Declara la pila abstracta, a lo sumo una vez.
    pub fn declare_stack(&mut self) {
        if !self.stack {
            self.output.declare("stack", "< >");
            self.stack = true;
        }
    }

    /// Registra el tamaño de una variable antes de conocer sus valores.
    pub fn declare_variable(&mut self, name: &str, size: Size) -> Semantic<()> {
        self.variables
            .declare(name, size)
            .map_err(|()| SemanticError::DuplicateVariable(name.to_owned()))
    }

    /// Emite la inicialización de una variable ya declarada.
    ///
    /// Un solo valor produce un escalar, varios una secuencia.
    pub fn initialize(&mut self, name: &str, values: &[String]) {
        let init = match values {
            [single] => single.clone(),
            _ => format!("< {} >", values.join(", ")),
        };

        self.output.declare(name, &init);
    }

    /// `offset nombre`, válido solo para variables declaradas.
    pub fn offset(&self, name: &str) -> Semantic<Operand> {
        match self.variables.get(name) {
            Some(_) => Ok(Operand::Pointer),
            None => Err(SemanticError::UndeclaredVariable(name.to_owned())),
        }
    }

    /// Ancho de un operando, si lo tiene.
    ///
    /// Los inmediatos y punteros se adaptan al ancho del otro operando.
    fn size_of(&self, operand: &Operand) -> Semantic<Option<Size>> {
        match operand {
            Operand::Register(register) => Ok(Some(register.size())),
            Operand::Memory { name, .. } => match self.variables.get(name) {
                Some(variable) => Ok(Some(variable.size())),
                None => Err(SemanticError::UndeclaredVariable(name.clone())),
            },

            Operand::Immediate(_) | Operand::Pointer => Ok(None),
        }
    }

    /// Ancho de un operando que debe ser un destino.
    fn destination_size(&self, mnemonic: &'static str, operand: &Operand) -> Semantic<Size> {
        self.size_of(operand)?
            .ok_or(SemanticError::UnsupportedOperands(mnemonic))
    }

    /// Determina el ancho común de un par destino-fuente.
    fn unify(
        &self,
        mnemonic: &'static str,
        destination: &Operand,
        source: &Operand,
    ) -> Semantic<Size> {
        if destination.is_memory() && source.is_memory() {
            return Err(SemanticError::UnsupportedOperands(mnemonic));
        }

        let size = self.destination_size(mnemonic, destination)?;
        match self.size_of(source)? {
            Some(other) if other != size => Err(SemanticError::SizeMismatch(size, other)),
            _ => Ok(size),
        }
    }

    /// Expresión que lee el valor de un operando en el ancho dado.
    fn value(&mut self, operand: &Operand, size: Size) -> Semantic<String> {
        let value = match operand {
            Operand::Register(register) => register.value(),
            Operand::Memory { name, text } => self.reference(name, text)?,
            Operand::Immediate(n) => literal(*n, size).to_string(),

            Operand::Pointer => self.pointer(size).to_string(),
        };

        Ok(value)
    }

    /// Sentencia que escribe `value` en el operando.
    ///
    /// `value` debe ser atómico o estar entre paréntesis. Escribir una
    /// mitad de registro preserva la otra mitad.
    fn store(&self, mnemonic: &'static str, operand: &Operand, value: &str) -> Semantic<String> {
        match operand {
            Operand::Register(register) => {
                let class = register.class();
                let word = register.owner();

                let assignment = if class.contains(RegisterClass::LOW_BYTE) {
                    format!("{0} := ({0} DIV 256) * 256 + {1}", word, value)
                } else if class.contains(RegisterClass::HIGH_BYTE) {
                    format!("{0} := ({0} MOD 256) + {1} * 256", word, value)
                } else {
                    format!("{} := {}", word, value)
                };

                Ok(assignment)
            }

            Operand::Memory { name, text } => {
                Ok(format!("{} := {}", self.reference(name, text)?, value))
            }

            Operand::Immediate(_) | Operand::Pointer => {
                Err(SemanticError::UnsupportedOperands(mnemonic))
            }
        }
    }

    /// Texto de una referencia a memoria con el nombre tal como fue declarado.
    fn reference(&self, name: &str, text: &str) -> Semantic<String> {
        match self.variables.get(name) {
            Some(variable) => {
                let suffix = text.get(name.len()..).unwrap_or_default();
                Ok(format!("{}{}", variable.name(), suffix))
            }

            None => Err(SemanticError::UndeclaredVariable(name.to_owned())),
        }
    }

    /// Valor de `@data` y `offset`.
    ///
    /// La primera referencia fija el valor para el resto de la traducción.
    fn pointer(&mut self, size: Size) -> i64 {
        let fixed = self.config.data_pointer;
        let pointer = *self.pointer.get_or_insert_with(|| match fixed {
            Some(value) => i64::from(value),
            None => arbitrary_word(),
        });

        debug!("Pointer reference resolved to {}", pointer);
        pointer % size.modulus()
    }
}

/// Patrón de bits de un literal en el ancho dado.
///
/// Se aceptan valores con o sin signo; lo que no cabe se trunca.
pub fn literal(n: i64, size: Size) -> i64 {
    let modulus = size.modulus();
    if n >= modulus || n < -modulus / 2 {
        warn!("Literal {} truncated to {}", n, size);
    }

    to_unsigned(n, size) % modulus
}

/// Un valor de 16 bits no especificado.
fn arbitrary_word() -> i64 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u8(0);
    (hasher.finish() & 0xffff) as i64
}
