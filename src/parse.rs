//! Análisis sintáctico y traducción dirigida por sintaxis.
//!
//! El parser es descendente recursivo con un token actual y uno de
//! lookahead. No construye un árbol: cada producción reconocida se
//! traduce de inmediato a través del [`Generator`]. La única forma de
//! retroceso es la reinyección de tokens que provoca una llamada a macro.

use crate::{
    codegen::{self, Condition, Generator, Operand, Operation, Semantic, SemanticError},
    config::Config,
    error::TranslateError,
    expand::TokenSource,
    lex::{Lexer, NoCase, Token, TokenKind},
    source::{InputStream, Located, Position},
    symbols::{MacroDefinition, MacroTable, Size},
};

use std::{collections::HashMap, mem, rc::Rc};
use thiserror::Error;
use tracing::{debug, trace};

/// Token inesperado.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Expected {}, found {}", one_of(.expected), .actual)]
pub struct SyntaxError {
    pub expected: Vec<TokenKind>,
    pub actual: TokenKind,
}

fn one_of(kinds: &[TokenKind]) -> String {
    match kinds {
        [single] => single.to_string(),
        _ => {
            let names: Vec<_> = kinds.iter().map(ToString::to_string).collect();
            format!("one of {}", names.join(", "))
        }
    }
}

type Translate<T> = Result<T, Located<TranslateError>>;

/// Ubica un error semántico en la posición dada.
fn semantic<T>(position: Position, result: Semantic<T>) -> Translate<T> {
    result.map_err(|error| Located::at(error.into(), position))
}

/// Estado completo de una traducción.
pub struct Parser<S: InputStream> {
    tokens: TokenSource<S>,
    curr: Token,
    la: Token,
    macros: MacroTable,
    procedures: HashMap<NoCase<String>, String>,
    generator: Generator,
}

impl<S: InputStream> Parser<S> {
    /// Prepara una traducción, leyendo los dos primeros tokens.
    pub fn new(lexer: Lexer<S>, config: &Config) -> Translate<Self> {
        let mut tokens = TokenSource::new(lexer);
        let curr = tokens.next_token().map_err(|error| error.map(TranslateError::from))?;
        let la = tokens.next_token().map_err(|error| error.map(TranslateError::from))?;

        Ok(Parser {
            tokens,
            curr,
            la,
            macros: MacroTable::default(),
            procedures: HashMap::new(),
            generator: Generator::new(config),
        })
    }

    /// Traduce el programa completo.
    pub fn translate(mut self) -> Translate<String> {
        self.program()?;
        Ok(self.generator.finish())
    }

    fn program(&mut self) -> Translate<()> {
        use TokenKind::*;

        if self.curr.kind() == Title {
            self.advance()?;
            self.expect(Ident)?;
        }

        self.expect(Model)?;
        self.check(&[Small, Compact, Medium, Large])?;

        if self.curr.kind() == Stack {
            self.advance()?;
            if self.curr.kind() == Number {
                self.advance()?;
            }

            self.generator.declare_stack();
        }

        if self.curr.kind() == Data {
            self.data()?;
        }

        self.code()?;
        self.expect(Eof).map(drop)
    }

    fn data(&mut self) -> Translate<()> {
        use TokenKind::*;

        self.expect(Data)?;
        while self.curr.kind() == Ident {
            let name = self.advance()?;
            let size = match self.check(&[Db, Dw])?.kind() {
                Db => Size::Byte,
                _ => Size::Word,
            };

            // El tamaño se conoce antes de convertir los valores
            let declared = self.generator.declare_variable(name.lexeme(), size);
            semantic(name.position(), declared)?;

            let mut values = vec![self.value(size)?];
            while self.curr.kind() == Comma {
                self.advance()?;
                values.push(self.value(size)?);
            }

            self.generator.initialize(name.lexeme(), &values);
        }

        Ok(())
    }

    fn value(&mut self, size: Size) -> Translate<String> {
        use TokenKind::*;

        let token = self.check(&[Number, Minus, Str, Question])?;
        let value = match token.kind() {
            Number => codegen::literal(token.value(), size).to_string(),
            Minus => {
                let magnitude = self.expect(Number)?.value();
                codegen::literal(-magnitude, size).to_string()
            }

            Str => format!("\"{}\"", token.lexeme()),
            _ => String::from("0"),
        };

        Ok(value)
    }

    fn code(&mut self) -> Translate<()> {
        use TokenKind::*;

        self.expect(Code)?;
        while self.curr.kind() == Ident {
            match self.la.kind() {
                Proc => self.procedure()?,
                Macro => self.macro_definition()?,
                _ => break,
            }
        }

        self.generator.begin_main();
        self.statements()?;

        // `end main` transfiere control al procedimiento de entrada
        if self.curr.kind() == End {
            self.advance()?;
            if self.curr.kind() == Ident {
                let entry = self.advance()?;
                match self.procedures.get(&NoCase::new(entry.lexeme().to_owned())) {
                    Some(name) => {
                        let name = name.clone();
                        self.generator.entry(&name);
                    }

                    None => debug!("Entry point `{}` is not a procedure", entry.lexeme()),
                }
            }
        }

        self.generator.end_actions();
        Ok(())
    }

    fn procedure(&mut self) -> Translate<()> {
        use TokenKind::*;

        let name = self.expect(Ident)?;
        self.expect(Proc)?;
        if self.curr.kind() == Far {
            self.advance()?;
        }

        let key = NoCase::new(name.lexeme().to_owned());
        self.procedures.insert(key, name.lexeme().to_owned());

        self.generator.begin_procedure(name.lexeme());
        self.statements()?;

        if self.curr.kind() == Ret {
            self.advance()?;
        }

        let closing = self.expect(Ident)?;
        if NoCase::new(closing.lexeme()) != NoCase::new(name.lexeme()) {
            let error = SemanticError::ProcedureNameMismatch {
                expected: name.lexeme().to_owned(),
                found: closing.lexeme().to_owned(),
            };

            return semantic(closing.position(), Err(error));
        }

        self.expect(Endp)?;
        self.generator.end_procedure();

        Ok(())
    }

    fn macro_definition(&mut self) -> Translate<()> {
        use TokenKind::*;

        let name = self.expect(Ident)?;
        self.expect(Macro)?;

        // Los parámetros formales solo pueden estar en la línea de `macro`
        let mut formal_params = Vec::new();
        if self.curr.kind() == Ident && self.curr.line() == name.line() {
            formal_params.push(self.advance()?);
            while self.curr.kind() == Comma {
                self.advance()?;
                formal_params.push(self.expect(Ident)?);
            }
        }

        let mut body = Vec::new();
        loop {
            match self.curr.kind() {
                Endm => break,
                Eof => return self.unexpected(&[Endm]),

                Ident if NoCase::new(self.curr.lexeme()) == NoCase::new(name.lexeme()) => {
                    let error = SemanticError::RecursiveMacro(name.lexeme().to_owned());
                    return semantic(self.curr.position(), Err(error));
                }

                // Las llamadas a macros ya definidas se expanden aquí mismo
                Ident => match self.macros.get(self.curr.lexeme()) {
                    Some(definition) => self.inject_macro(definition)?,
                    None => body.push(self.advance()?),
                },

                _ => body.push(self.advance()?),
            }
        }

        self.expect(Endm)?;

        debug!(
            "Macro `{}` defined with {} parameters and {} tokens",
            name.lexeme(),
            formal_params.len(),
            body.len()
        );

        let definition = MacroDefinition::new(name.lexeme().to_owned(), formal_params, body);
        self.macros.define(definition).map_err(|definition| {
            let error = SemanticError::DuplicateMacro(definition.name().to_owned());
            Located::at(error.into(), name.position())
        })
    }

    /// Secuencia de etiquetas, instrucciones y llamadas a macros.
    fn statements(&mut self) -> Translate<()> {
        use TokenKind::*;

        loop {
            match self.curr.kind() {
                // Cierre de procedimiento sin `ret`
                Ident if self.la.kind() == Endp => break,

                Ident => match self.macros.get(self.curr.lexeme()) {
                    Some(definition) => self.inject_macro(definition)?,
                    None => self.label()?,
                },

                kind if kind.is_one_arg() => self.one_arg_statement()?,
                kind if kind.is_two_arg() => self.two_arg_statement()?,
                _ => break,
            }
        }

        Ok(())
    }

    fn label(&mut self) -> Translate<()> {
        let name = self.expect(TokenKind::Ident)?;
        self.expect(TokenKind::Colon)?;

        self.generator.label(name.lexeme());
        Ok(())
    }

    /// Reemplaza una llamada a macro por su expansión.
    ///
    /// Los argumentos reales pueden ir entre paréntesis. La expansión,
    /// seguida de los tokens actual y de lookahead, se coloca al frente de
    /// la entrada.
    fn inject_macro(&mut self, definition: Rc<MacroDefinition>) -> Translate<()> {
        use TokenKind::*;

        let call = self.advance()?;
        let parenthesized = self.curr.kind() == LParen;
        if parenthesized {
            self.advance()?;
        }

        let expected = definition.formal_params().len();
        let mut actuals = Vec::with_capacity(expected);

        for index in 0..expected {
            if index > 0 && self.curr.kind() != Comma {
                return self.arity(&call, &definition, index);
            } else if index > 0 {
                self.advance()?;
            }

            actuals.push(self.actual()?);
        }

        if self.curr.kind() == Comma {
            return self.arity(&call, &definition, expected + 1);
        }

        if parenthesized {
            self.expect(RParen)?;
        }

        let mut expansion = definition.expand(&actuals);
        expansion.push(mem::take(&mut self.curr));
        expansion.push(mem::take(&mut self.la));

        self.tokens.inject(expansion);
        self.curr = self.pull()?;
        self.la = self.pull()?;

        debug!(
            "Expanded macro `{}` at {} (depth {})",
            definition.name(),
            call.position(),
            self.tokens.depth()
        );

        Ok(())
    }

    /// Argumento real de una llamada a macro.
    fn actual(&mut self) -> Translate<Token> {
        use TokenKind::*;

        let token = self.check(&[Ident, Number, Str, Register, Minus])?;
        if token.kind() != Minus {
            return Ok(token);
        }

        let number = self.expect(Number)?;
        let lexeme = format!("-{}", number.lexeme());

        Ok(Token::new(Number, -number.value(), lexeme, token.position()))
    }

    fn arity<T>(&self, call: &Token, definition: &MacroDefinition, found: usize) -> Translate<T> {
        let error = SemanticError::MacroArity {
            name: definition.name().to_owned(),
            expected: definition.formal_params().len(),
            found,
        };

        semantic(call.position(), Err(error))
    }

    fn one_arg_statement(&mut self) -> Translate<()> {
        use TokenKind::*;

        let mnemonic = self.advance()?;
        let at = mnemonic.position();

        let condition = match mnemonic.kind() {
            Ja => Some(Condition::Above),
            Jae => Some(Condition::AboveOrEqual),
            Jb => Some(Condition::Below),
            Jbe => Some(Condition::BelowOrEqual),
            Jg => Some(Condition::Greater),
            Jge => Some(Condition::GreaterOrEqual),
            Jl => Some(Condition::Less),
            Jle => Some(Condition::LessOrEqual),
            Je | Jz => Some(Condition::Equal),
            Jne | Jnz => Some(Condition::NotEqual),
            _ => None,
        };

        if let Some(condition) = condition {
            let target = self.expect(Ident)?;
            self.generator.jump_if(condition, target.lexeme());
            return Ok(());
        }

        match mnemonic.kind() {
            Jmp => {
                let target = self.expect(Ident)?;
                self.generator.jump(target.lexeme());
            }

            Loop => {
                let target = self.expect(Ident)?;
                self.generator.repeat(target.lexeme());
            }

            Call => {
                let target = self.expect(Ident)?;
                let name = self
                    .procedures
                    .get(&NoCase::new(target.lexeme().to_owned()))
                    .cloned()
                    .unwrap_or_else(|| target.lexeme().to_owned());

                self.generator.call(&name);
            }

            kind => {
                let operand = self.argument()?;
                let one = Operand::Immediate(1);
                let generator = &mut self.generator;

                let result = match kind {
                    Int => generator.interrupt(&operand),
                    Push => generator.push(&operand),
                    Pop => generator.pop(&operand),
                    Mul => generator.multiply(&operand),
                    Div => generator.divide(&operand),
                    Not => generator.complement(&operand),
                    Neg => generator.arithmetic(Operation::Negate, &operand, &operand),
                    Inc => generator.arithmetic(Operation::Increment, &operand, &one),
                    _ => generator.arithmetic(Operation::Decrement, &operand, &one),
                };

                semantic(at, result)?;
            }
        }

        Ok(())
    }

    fn two_arg_statement(&mut self) -> Translate<()> {
        use TokenKind::*;

        let mnemonic = self.advance()?;
        let destination = self.argument()?;
        self.expect(Comma)?;
        let source = self.argument()?;

        let generator = &mut self.generator;
        let result = match mnemonic.kind() {
            Mov => generator.mov(&destination, &source),
            Xchg => generator.xchg(&destination, &source),
            Cmp => generator.arithmetic(Operation::Compare, &destination, &source),
            Add => generator.arithmetic(Operation::Add, &destination, &source),
            Sub => generator.arithmetic(Operation::Sub, &destination, &source),
            _ => {
                generator.ignore(mnemonic.lexeme());
                Ok(())
            }
        };

        semantic(mnemonic.position(), result)
    }

    fn argument(&mut self) -> Translate<Operand> {
        use TokenKind::*;

        let token = self.check(&[Ident, Number, Minus, Register, AtData, Offset])?;
        let operand = match token.kind() {
            Ident if self.curr.kind() == LBracket => {
                let name = token.lexeme().to_owned();
                let text = self.index(&name)?;

                Operand::Memory { name, text }
            }

            Ident => Operand::variable(token.lexeme()),
            Number => Operand::Immediate(token.value()),
            Minus => Operand::Immediate(-self.expect(Number)?.value()),
            AtData => Operand::Pointer,

            Offset => {
                let name = self.expect(Ident)?;
                semantic(name.position(), self.generator.offset(name.lexeme()))?
            }

            _ => match token.register() {
                Some(register) => Operand::Register(register),
                None => return self.unexpected(&[Register]),
            },
        };

        Ok(operand)
    }

    /// Texto de un acceso indexado, `nombre[base + desplazamiento + 1]`.
    fn index(&mut self, name: &str) -> Translate<String> {
        use TokenKind::*;

        self.expect(LBracket)?;
        let mut text = format!("{}[{}", name, self.index_term()?);

        while matches!(self.curr.kind(), Plus | Minus) {
            let operator = self.advance()?;
            let term = self.index_term()?;
            text.push_str(&format!(" {} {}", operator.lexeme(), term));
        }

        self.expect(RBracket)?;
        text.push_str(" + 1]");

        Ok(text)
    }

    fn index_term(&mut self) -> Translate<String> {
        let token = self.check(&[TokenKind::Number, TokenKind::Register])?;
        let term = match token.register() {
            Some(register) => register.value(),
            None => token.value().to_string(),
        };

        Ok(term)
    }

    /// Acepta el token actual si su clase es alguna de `kinds`.
    fn check(&mut self, kinds: &[TokenKind]) -> Translate<Token> {
        if kinds.contains(&self.curr.kind()) {
            self.advance()
        } else {
            self.unexpected(kinds)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Translate<Token> {
        self.check(&[kind])
    }

    /// Consume el token actual y lo retorna.
    fn advance(&mut self) -> Translate<Token> {
        let next = self.pull()?;
        let la = mem::replace(&mut self.la, next);
        let token = mem::replace(&mut self.curr, la);

        trace!("Token {} at {}", token, token.position());
        Ok(token)
    }

    fn pull(&mut self) -> Translate<Token> {
        self.tokens
            .next_token()
            .map_err(|error| error.map(TranslateError::from))
    }

    fn unexpected<T>(&self, expected: &[TokenKind]) -> Translate<T> {
        let error = SyntaxError {
            expected: expected.to_vec(),
            actual: self.curr.kind(),
        };

        Err(Located::at(error.into(), self.curr.position()))
    }
}
