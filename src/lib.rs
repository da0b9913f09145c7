//! Traductor de ensamblador 8086 a WSL.
//!
//! # Front end
//! El programa fuente se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. Ese flujo pasa por [`expand`],
//! donde las llamadas a macros se sustituyen por sus cuerpos, antes de
//! llegar al parser en [`parse`].
//!
//! # Traducción
//! No existe un árbol sintáctico intermedio. Cada producción reconocida
//! por el parser se traduce en el acto mediante [`codegen`], que emula
//! registros, banderas y memoria con variables WSL explícitas. El texto
//! generado se acumula en las regiones de [`output`] y se ensambla al
//! final en un único programa.
//!
//! # Errores
//! La primera falla detiene la traducción. Todo error lleva la posición
//! donde ocurrió; [`error::Diagnostic`] lo presenta junto a la línea
//! original.

#[macro_use]
mod macros;

pub mod codegen;
pub mod config;
pub mod error;
pub mod expand;
pub mod lex;
pub mod output;
pub mod parse;
pub mod source;
pub mod symbols;

use config::Config;
use error::TranslateError;
use lex::Lexer;
use parse::Parser;
use source::Located;

use std::io::BufRead;

/// Traduce un programa completo con la configuración por omisión.
pub fn translate(source: &str) -> Result<String, Located<TranslateError>> {
    translate_with(source.as_bytes(), &Config::default())
}

/// Traduce un programa leído de un flujo arbitrario.
pub fn translate_with<R: BufRead>(
    reader: R,
    config: &Config,
) -> Result<String, Located<TranslateError>> {
    let lexer = Lexer::new(source::consume(reader));
    Parser::new(lexer, config)?.translate()
}
