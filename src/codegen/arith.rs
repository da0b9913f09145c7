//! Aritmética y emulación de banderas.
//!
//! Toda operación aritmética se calcula en `temp` con precisión
//! arbitraria y luego se reduce al ancho del destino. Las banderas se
//! derivan de `temp` y de los operandos originales, que aún no han sido
//! sobrescritos cuando se evalúan las condiciones.

use super::{Generator, Operand, Semantic};
use crate::symbols::{Register, Size};

/// Operaciones que comparten el mismo esquema de banderas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Compare,
    Increment,
    Decrement,
    Negate,
}

impl Operation {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Compare => "cmp",
            Operation::Increment => "inc",
            Operation::Decrement => "dec",
            Operation::Negate => "neg",
        }
    }

    fn operator(self) -> char {
        if self.borrows() {
            '-'
        } else {
            '+'
        }
    }

    /// Pertenece a la familia de la resta.
    fn borrows(self) -> bool {
        !matches!(self, Operation::Add | Operation::Increment)
    }

    /// `inc` y `dec` no alteran el acarreo.
    fn writes_carry(self) -> bool {
        !matches!(self, Operation::Increment | Operation::Decrement)
    }
}

/// Bit de signo de un valor en el ancho dado.
fn sign_bit(value: &str, size: Size) -> String {
    format!("((({}) DIV 2**{}) MOD 2)", value, size.bits() - 1)
}

impl Generator {
    /// `add`, `sub`, `cmp`, `inc`, `dec` y `neg`.
    ///
    /// Para `inc` y `dec` la fuente es el inmediato 1. Para `neg` la
    /// fuente es el mismo destino y se calcula `0 - destino`.
    pub fn arithmetic(
        &mut self,
        operation: Operation,
        destination: &Operand,
        source: &Operand,
    ) -> Semantic<()> {
        let mnemonic = operation.mnemonic();
        let size = match operation {
            Operation::Negate => self.destination_size(mnemonic, destination)?,
            _ => self.unify(mnemonic, destination, source)?,
        };

        let (lhs, rhs) = match operation {
            Operation::Negate => (String::from("0"), self.value(destination, size)?),
            _ => (self.value(destination, size)?, self.value(source, size)?),
        };

        // El destino debe ser escribible incluso para `cmp`
        let store = self.store(mnemonic, destination, "temp")?;

        emit!(self.output, "temp := {};", lhs);
        emit!(self.output, "temp := temp {} {};", operation.operator(), rhs);

        self.carry(operation, size);
        self.flag("flag_z", "temp = 0");
        self.flag("flag_s", &format!("{} = 1", sign_bit("temp", size)));
        self.overflow(operation, &lhs, &rhs, size);

        if operation != Operation::Compare {
            emit!(self.output, "{};", store);
        }

        Ok(())
    }

    /// `mul`, sin signo, con acumulador implícito.
    ///
    /// `al * fuente` queda en `ax`; `ax * fuente` queda en `dx:ax`.
    /// Acarreo y desbordamiento indican que el producto no cabe en el
    /// ancho de la fuente.
    pub fn multiply(&mut self, source: &Operand) -> Semantic<()> {
        let size = self.destination_size("mul", source)?;
        let accumulator = match size {
            Size::Byte => Register::Al,
            Size::Word => Register::Ax,
        };

        let factor = self.value(source, size)?;

        emit!(self.output, "temp := {};", accumulator.value());
        emit!(self.output, "temp := temp * {};", factor);
        emit!(self.output, "IF temp >= 2**{} THEN", size.bits());
        emit!(self.output, "flag_o := 1;");
        emit!(self.output, "flag_c := 1");
        emit!(self.output, "ELSE");
        emit!(self.output, "flag_o := 0;");
        emit!(self.output, "flag_c := 0");
        emit!(self.output, "FI;");

        match size {
            Size::Byte => emit!(self.output, "ax := temp;"),
            Size::Word => {
                emit!(self.output, "dx := temp DIV 65536;");
                emit!(self.output, "ax := temp MOD 65536;");
            }
        }

        Ok(())
    }

    /// `div`, sin signo, con acumulador implícito.
    ///
    /// Un divisor cero o un cociente que no cabe en el ancho del divisor
    /// terminan el programa con `CALL Z` antes de modificar registros.
    pub fn divide(&mut self, source: &Operand) -> Semantic<()> {
        let size = self.destination_size("div", source)?;
        let divisor = self.value(source, size)?;
        let dividend = match size {
            Size::Byte => "ax",
            Size::Word => "(dx * 65536 + ax)",
        };

        emit!(self.output, "IF {} = 0 THEN", divisor);
        emit!(self.output, "CALL Z");
        emit!(self.output, "ELSE");
        emit!(self.output, "temp := {} DIV {};", dividend, divisor);
        emit!(self.output, "IF temp >= 2**{} THEN", size.bits());
        emit!(self.output, "CALL Z");
        emit!(self.output, "ELSE");

        match size {
            Size::Byte => {
                emit!(self.output, "ax := ({} MOD {}) * 256 + temp", dividend, divisor);
            }

            Size::Word => {
                emit!(self.output, "dx := {} MOD {};", dividend, divisor);
                emit!(self.output, "ax := temp");
            }
        }

        emit!(self.output, "FI");
        emit!(self.output, "FI;");

        Ok(())
    }

    /// `not`: complemento a uno, sin banderas.
    pub fn complement(&mut self, destination: &Operand) -> Semantic<()> {
        let size = self.destination_size("not", destination)?;
        let value = self.value(destination, size)?;
        let complement = format!("({} - {})", size.modulus() - 1, value);

        let store = self.store("not", destination, &complement)?;
        emit!(self.output, "{};", store);

        Ok(())
    }

    /// Acarreo, o solo la reducción de `temp` si la operación lo preserva.
    fn carry(&mut self, operation: Operation, size: Size) {
        let bits = size.bits();
        let (condition, wrap) = if operation.borrows() {
            (String::from("temp < 0"), format!("temp := temp + 2**{}", bits))
        } else {
            (
                format!("temp >= 2**{}", bits),
                format!("temp := temp MOD 2**{}", bits),
            )
        };

        emit!(self.output, "IF {} THEN", condition);
        if operation.writes_carry() {
            emit!(self.output, "{};", wrap);
            emit!(self.output, "flag_c := 1");
            emit!(self.output, "ELSE");
            emit!(self.output, "flag_c := 0");
        } else {
            emit!(self.output, "{}", wrap);
        }

        emit!(self.output, "FI;");
    }

    /// Desbordamiento con signo en complemento a dos.
    fn overflow(&mut self, operation: Operation, lhs: &str, rhs: &str, size: Size) {
        let (operands, result) = if operation.borrows() {
            ("<>", "=")
        } else {
            ("=", "<>")
        };

        let condition = format!(
            "{} {} {} AND {} {} {}",
            sign_bit(lhs, size),
            operands,
            sign_bit(rhs, size),
            sign_bit("temp", size),
            result,
            sign_bit(rhs, size),
        );

        self.flag("flag_o", &condition);
    }

    /// Asigna 1 o 0 a una bandera según una condición.
    fn flag(&mut self, flag: &str, condition: &str) {
        emit!(self.output, "IF {} THEN", condition);
        emit!(self.output, "{} := 1", flag);
        emit!(self.output, "ELSE");
        emit!(self.output, "{} := 0", flag);
        emit!(self.output, "FI;");
    }
}
