//! Expansión de macros.
//!
//! Una llamada a macro se resuelve sustituyendo parámetros formales por
//! argumentos reales dentro del cuerpo almacenado. La lista resultante se
//! reinyecta al frente de la entrada, de modo que el parser la consume
//! exactamente igual que tokens escaneados.

use crate::{
    lex::{Lexer, LexerError, Token},
    source::{InputStream, Located},
    symbols::MacroDefinition,
};

use std::vec;

impl MacroDefinition {
    /// Sustituye argumentos reales en el cuerpo.
    ///
    /// Cada token del cuerpo igual a algún parámetro formal se reemplaza
    /// por el argumento en la misma posición. El resultado siempre tiene
    /// la misma longitud que el cuerpo.
    pub fn expand(&self, actuals: &[Token]) -> Vec<Token> {
        self.body()
            .iter()
            .map(|token| {
                self.formal_params()
                    .iter()
                    .zip(actuals)
                    .find(|(formal, _)| *formal == token)
                    .map_or(token, |(_, actual)| actual)
                    .clone()
            })
            .collect()
    }
}

/// Origen de tokens del parser.
///
/// Se trata de una pila de expansiones pendientes por encima del lexer.
/// Siempre se consume primero la expansión más reciente; al agotarse todas
/// se recurre al lexer.
pub struct TokenSource<S: InputStream> {
    lexer: Lexer<S>,
    frames: Vec<vec::IntoIter<Token>>,
}

impl<S: InputStream> TokenSource<S> {
    pub fn new(lexer: Lexer<S>) -> Self {
        TokenSource {
            lexer,
            frames: Vec::new(),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, Located<LexerError>> {
        while let Some(frame) = self.frames.last_mut() {
            match frame.next() {
                Some(token) => return Ok(token),
                None => {
                    self.frames.pop();
                }
            }
        }

        self.lexer.next_token()
    }

    /// Coloca una lista de tokens al frente de la entrada.
    pub fn inject(&mut self, tokens: Vec<Token>) {
        self.frames.push(tokens.into_iter());
    }

    /// Cantidad de expansiones con tokens aún sin consumir.
    pub fn depth(&self) -> usize {
        self.frames.iter().filter(|frame| frame.len() > 0).count()
    }
}
