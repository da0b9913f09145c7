//! Tablas de símbolos.
//!
//! Este módulo describe todo aquello que el traductor recuerda entre
//! producciones: tamaños de operandos, clasificación de registros,
//! variables declaradas en `.data` y definiciones de macros.

use crate::lex::{NoCase, Token};
use bitflags::bitflags;
use std::{
    collections::HashMap,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

/// Ancho de un operando.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Size {
    /// 8 bits (`db`, `al`, `ah`, ...).
    Byte,

    /// 16 bits (`dw`, `ax`, `si`, ...).
    Word,
}

impl Size {
    /// Cantidad de bits.
    pub fn bits(self) -> u32 {
        match self {
            Size::Byte => 8,
            Size::Word => 16,
        }
    }

    /// `2**bits`, el primer valor que no cabe en este ancho.
    pub fn modulus(self) -> i64 {
        1 << self.bits()
    }
}

impl Display for Size {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} bits", self.bits())
    }
}

/// Convierte un literal a su patrón de bits sin signo en el ancho dado.
///
/// Los valores no negativos se preservan tal cual.
pub fn to_unsigned(n: i64, size: Size) -> i64 {
    if n >= 0 {
        n
    } else {
        n.rem_euclid(size.modulus())
    }
}

bitflags! {
    /// Clases de registros.
    ///
    /// Todo registro pertenece a exactamente una de las tres clases base.
    pub struct RegisterClass: u8 {
        const WORD = 0b001;
        const LOW_BYTE = 0b010;
        const HIGH_BYTE = 0b100;
        const SINGLE_BYTE = Self::LOW_BYTE.bits | Self::HIGH_BYTE.bits;
    }
}

/// Uno de los 20 registros reconocidos.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    Ax,
    Bx,
    Cx,
    Dx,
    Si,
    Di,
    Bp,
    Sp,
    Cs,
    Ds,
    Ss,
    Es,
    Al,
    Bl,
    Cl,
    Dl,
    Ah,
    Bh,
    Ch,
    Dh,
}

impl Register {
    pub const ALL: [Register; 20] = {
        use Register::*;
        [
            Ax, Bx, Cx, Dx, Si, Di, Bp, Sp, Cs, Ds, Ss, Es, Al, Bl, Cl, Dl, Ah, Bh, Ch, Dh,
        ]
    };

    /// Nombre canónico en minúsculas.
    pub fn name(self) -> &'static str {
        use Register::*;

        match self {
            Ax => "ax",
            Bx => "bx",
            Cx => "cx",
            Dx => "dx",
            Si => "si",
            Di => "di",
            Bp => "bp",
            Sp => "sp",
            Cs => "cs",
            Ds => "ds",
            Ss => "ss",
            Es => "es",
            Al => "al",
            Bl => "bl",
            Cl => "cl",
            Dl => "dl",
            Ah => "ah",
            Bh => "bh",
            Ch => "ch",
            Dh => "dh",
        }
    }

    pub fn class(self) -> RegisterClass {
        use Register::*;

        match self {
            Al | Bl | Cl | Dl => RegisterClass::LOW_BYTE,
            Ah | Bh | Ch | Dh => RegisterClass::HIGH_BYTE,
            _ => RegisterClass::WORD,
        }
    }

    pub fn size(self) -> Size {
        if self.class().intersects(RegisterClass::SINGLE_BYTE) {
            Size::Byte
        } else {
            Size::Word
        }
    }

    /// Registro de 16 bits que contiene a este.
    ///
    /// `al` y `ah` pertenecen a `ax`, y así sucesivamente. La relación
    /// se deriva de la primera letra del nombre.
    pub fn owner(self) -> Register {
        if !self.class().intersects(RegisterClass::SINGLE_BYTE) {
            return self;
        }

        let word = format!("{}x", &self.name()[..1]);
        word.parse().unwrap_or(self)
    }

    /// Expresión que evalúa al contenido actual del registro.
    pub fn value(self) -> String {
        let class = self.class();
        let owner = self.owner().name();

        if class.contains(RegisterClass::HIGH_BYTE) {
            format!("({} DIV 256)", owner)
        } else if class.contains(RegisterClass::LOW_BYTE) {
            format!("({} MOD 256)", owner)
        } else {
            owner.to_string()
        }
    }
}

impl Display for Register {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .iter()
            .find(|register| NoCase::new(register.name()) == NoCase::new(string))
            .copied()
            .ok_or(())
    }
}

/// Variable declarada en el segmento de datos.
#[derive(Clone, Debug)]
pub struct Variable {
    name: String,
    size: Size,
}

impl Variable {
    /// Nombre tal como fue declarado.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

/// Tabla de tamaños de variables.
///
/// Las búsquedas no distinguen mayúsculas y descartan cualquier
/// sufijo de indexado: `arr[bp+1]` resuelve a `arr`.
#[derive(Default)]
pub struct VariableTable(HashMap<NoCase<String>, Variable>);

impl VariableTable {
    /// Registra una variable. Falla si el nombre ya existía.
    pub fn declare(&mut self, name: &str, size: Size) -> Result<(), ()> {
        let key = NoCase::new(name.to_owned());
        if self.0.contains_key(&key) {
            return Err(());
        }

        let name = name.to_owned();
        self.0.insert(key, Variable { name, size });
        Ok(())
    }

    pub fn get(&self, reference: &str) -> Option<&Variable> {
        self.0.get(&NoCase::new(base_name(reference).to_owned()))
    }
}

/// Nombre de una referencia sin su sufijo de indexado.
pub fn base_name(reference: &str) -> &str {
    match reference.find('[') {
        Some(index) => reference[..index].trim_end(),
        None => reference,
    }
}

/// Una macro completamente definida.
///
/// El cuerpo se almacena ya expandido: nunca contiene llamadas a otras
/// macros.
#[derive(Clone, Debug)]
pub struct MacroDefinition {
    name: String,
    formal_params: Vec<Token>,
    body: Vec<Token>,
}

impl MacroDefinition {
    pub fn new(name: String, formal_params: Vec<Token>, body: Vec<Token>) -> Self {
        MacroDefinition {
            name,
            formal_params,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formal_params(&self) -> &[Token] {
        &self.formal_params
    }

    pub fn body(&self) -> &[Token] {
        &self.body
    }
}

/// Macros definidas hasta el momento.
#[derive(Default)]
pub struct MacroTable(HashMap<NoCase<String>, Rc<MacroDefinition>>);

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<Rc<MacroDefinition>> {
        self.0.get(&NoCase::new(name.to_owned())).cloned()
    }

    /// Registra una macro. Falla si el nombre ya existía.
    pub fn define(&mut self, definition: MacroDefinition) -> Result<(), MacroDefinition> {
        let key = NoCase::new(definition.name.clone());
        if self.0.contains_key(&key) {
            return Err(definition);
        }

        self.0.insert(key, Rc::new(definition));
        Ok(())
    }
}
