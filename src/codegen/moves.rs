//! Movimiento de datos. Ninguna de estas instrucciones toca banderas.

use super::{Generator, Operand, Semantic, SemanticError};
use crate::symbols::Size;
use tracing::debug;

impl Generator {
    /// `mov destino, fuente`.
    ///
    /// Una fuente `@data` u `offset` lee el valor de puntero fijado
    /// por la primera de estas referencias.
    pub fn mov(&mut self, destination: &Operand, source: &Operand) -> Semantic<()> {
        let size = self.unify("mov", destination, source)?;
        let value = self.value(source, size)?;
        let store = self.store("mov", destination, &value)?;

        emit!(self.output, "{};", store);
        Ok(())
    }

    /// `xchg a, b` como asignación simultánea.
    pub fn xchg(&mut self, a: &Operand, b: &Operand) -> Semantic<()> {
        if a.is_constant() || b.is_constant() {
            return Err(SemanticError::UnsupportedOperands("xchg"));
        }

        let size = self.unify("xchg", a, b)?;
        match (a, b) {
            _ if a == b => debug!("Exchange of {:?} with itself omitted", a),

            // Ambas mitades de un mismo registro: intercambio de bytes
            (Operand::Register(x), Operand::Register(y)) if x.owner() == y.owner() => {
                let word = x.owner();
                emit!(self.output, "{0} := ({0} MOD 256) * 256 + ({0} DIV 256);", word);
            }

            _ => {
                let (value_a, value_b) = (self.value(a, size)?, self.value(b, size)?);
                let into_a = self.store("xchg", a, &value_b)?;
                let into_b = self.store("xchg", b, &value_a)?;

                emit!(self.output, "< {}, {} >;", into_a, into_b);
            }
        }

        Ok(())
    }

    /// `push fuente`, siempre de 16 bits.
    pub fn push(&mut self, source: &Operand) -> Semantic<()> {
        self.require_word("push", source)?;
        self.declare_stack();

        let value = self.value(source, Size::Word)?;
        emit!(self.output, "PUSH(stack, {});", value);

        Ok(())
    }

    /// `pop destino`, siempre de 16 bits.
    pub fn pop(&mut self, destination: &Operand) -> Semantic<()> {
        self.require_word("pop", destination)?;
        let store = self.store("pop", destination, "temp")?;
        self.declare_stack();

        emit!(self.output, "POP(temp, stack);");
        emit!(self.output, "{};", store);

        Ok(())
    }

    fn require_word(&self, mnemonic: &'static str, operand: &Operand) -> Semantic<()> {
        match self.size_of(operand)? {
            Some(Size::Byte) => Err(SemanticError::UnsupportedOperands(mnemonic)),
            _ => Ok(()),
        }
    }
}
