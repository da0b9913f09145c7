//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del traductor. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios (`;` hasta fin de línea) se descartan durante
//! esta operación. Cada token emitido está asociado a una posición en el
//! código fuente original.
//!
//! # Contenido de un token
//! Todo token lleva su clase ([`TokenKind`]), un valor numérico (solo
//! significativo para literales enteros) y su lexema. Los identificadores
//! conservan el texto original, mientras que los literales de cadena
//! conservan su contenido sin comillas y sin procesar escapes.
//!
//! # Reglas importantes del lenguaje
//! - Palabras clave, mnemónicos, directivas y registros no distinguen entre
//!   mayúsculas y minúsculas: `MOV`, `mov` y `MoV` son [`TokenKind::Mov`].
//! - Un literal entero empieza con un dígito decimal. Un sufijo `h`/`H`
//!   lo vuelve hexadecimal, en cuyo caso se admiten también `a-f`.
//! - Las directivas de segmento empiezan con `.` y `@data` con `@`.
//!
//! # Errores
//! El lexer no se recupera de errores. El primer error detiene la traducción.

use crate::{
    source::{InputStream, Located, Position},
    symbols::Register,
};

use std::{
    fmt::{self, Display},
    iter::Peekable,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Literal entero máximo.
const INT_MAX: i64 = u16::MAX as i64;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error: {0}")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Un literal de cadena no fue cerrado antes del fin de línea.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Dígitos inválidos para la base del literal.
    #[error("Malformed integer literal `{0}`")]
    BadNumber(String),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// Directiva con `.` o `@` que no pertenece al lenguaje.
    #[error("Unknown directive `{0}`")]
    UnknownDirective(String),
}

/// Clase de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Comma,
    Colon,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Minus,
    Question,
    Number,
    Str,
    Title,
    Model,
    Stack,
    Data,
    Code,
    End,
    Small,
    Compact,
    Medium,
    Large,
    Db,
    Dw,
    Proc,
    Far,
    Ret,
    Endp,
    Macro,
    Endm,
    Int,
    Loop,
    Push,
    Pop,
    Inc,
    Dec,
    Call,
    Neg,
    Not,
    Mul,
    Div,
    Jmp,
    Ja,
    Jae,
    Jb,
    Jbe,
    Jg,
    Jge,
    Jl,
    Jle,
    Je,
    Jne,
    Jz,
    Jnz,
    Mov,
    Xchg,
    Cmp,
    Add,
    Sub,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Register,
    AtData,
    Offset,
    Ident,
    Eof,
}

impl TokenKind {
    /// Mnemónicos que reciben un único argumento.
    pub fn is_one_arg(self) -> bool {
        use TokenKind::*;

        matches!(
            self,
            Int | Loop
                | Push
                | Pop
                | Inc
                | Dec
                | Call
                | Neg
                | Not
                | Mul
                | Div
                | Jmp
                | Ja
                | Jae
                | Jb
                | Jbe
                | Jg
                | Jge
                | Jl
                | Jle
                | Je
                | Jne
                | Jz
                | Jnz
        )
    }

    /// Mnemónicos que reciben dos argumentos.
    pub fn is_two_arg(self) -> bool {
        use TokenKind::*;
        matches!(self, Mov | Xchg | Cmp | Add | Sub | Shl | Shr | And | Or | Xor)
    }
}

impl Default for TokenKind {
    fn default() -> Self {
        TokenKind::Eof
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        let string = match self {
            Comma => "`,`",
            Colon => "`:`",
            LBracket => "`[`",
            RBracket => "`]`",
            LParen => "`(`",
            RParen => "`)`",
            Plus => "`+`",
            Minus => "`-`",
            Question => "`?`",
            Number => "number",
            Str => "string",
            Register => "register",
            Ident => "identifier",
            Eof => "end of input",
            AtData => "`@data`",
            Model => "`.model`",
            Stack => "`.stack`",
            Data => "`.data`",
            Code => "`.code`",
            keyword => {
                let name = KEYWORDS
                    .iter()
                    .find(|&&(_, kind)| kind == *keyword)
                    .map(|(name, _)| *name)
                    .unwrap_or("?");

                return write!(fmt, "`{}`", name);
            }
        };

        fmt.write_str(string)
    }
}

/// Palabras clave que se escriben sin prefijo.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("title", TokenKind::Title),
    ("end", TokenKind::End),
    ("small", TokenKind::Small),
    ("compact", TokenKind::Compact),
    ("medium", TokenKind::Medium),
    ("large", TokenKind::Large),
    ("db", TokenKind::Db),
    ("dw", TokenKind::Dw),
    ("proc", TokenKind::Proc),
    ("far", TokenKind::Far),
    ("ret", TokenKind::Ret),
    ("endp", TokenKind::Endp),
    ("macro", TokenKind::Macro),
    ("endm", TokenKind::Endm),
    ("int", TokenKind::Int),
    ("loop", TokenKind::Loop),
    ("push", TokenKind::Push),
    ("pop", TokenKind::Pop),
    ("inc", TokenKind::Inc),
    ("dec", TokenKind::Dec),
    ("call", TokenKind::Call),
    ("neg", TokenKind::Neg),
    ("not", TokenKind::Not),
    ("mul", TokenKind::Mul),
    ("div", TokenKind::Div),
    ("jmp", TokenKind::Jmp),
    ("ja", TokenKind::Ja),
    ("jae", TokenKind::Jae),
    ("jb", TokenKind::Jb),
    ("jbe", TokenKind::Jbe),
    ("jg", TokenKind::Jg),
    ("jge", TokenKind::Jge),
    ("jl", TokenKind::Jl),
    ("jle", TokenKind::Jle),
    ("je", TokenKind::Je),
    ("jne", TokenKind::Jne),
    ("jz", TokenKind::Jz),
    ("jnz", TokenKind::Jnz),
    ("mov", TokenKind::Mov),
    ("xchg", TokenKind::Xchg),
    ("cmp", TokenKind::Cmp),
    ("add", TokenKind::Add),
    ("sub", TokenKind::Sub),
    ("shl", TokenKind::Shl),
    ("shr", TokenKind::Shr),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("xor", TokenKind::Xor),
    ("offset", TokenKind::Offset),
];

/// Directivas precedidas por `.` o `@`.
const DIRECTIVES: &[(&str, TokenKind)] = &[
    (".model", TokenKind::Model),
    (".stack", TokenKind::Stack),
    (".data", TokenKind::Data),
    (".code", TokenKind::Code),
    ("@data", TokenKind::AtData),
];

/// Resuelve palabras que no son identificadores.
struct Keyword(TokenKind);

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let folded = NoCase::new(string);

        KEYWORDS
            .iter()
            .find(|&&(name, _)| NoCase::new(name) == folded)
            .map(|&(_, kind)| Keyword(kind))
            .or_else(|| {
                Register::from_str(string)
                    .ok()
                    .map(|_| Keyword(TokenKind::Register))
            })
            .ok_or(())
    }
}

/// Objeto resultante del análisis léxico.
///
/// Dos tokens son iguales si coinciden en clase, valor numérico y lexema.
/// La posición no participa en la comparación y los lexemas de
/// identificadores se comparan sin distinguir mayúsculas.
#[derive(Clone, Debug, Default)]
pub struct Token {
    kind: TokenKind,
    value: i64,
    lexeme: String,
    position: Position,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, value: i64, lexeme: S, position: Position) -> Self {
        Token {
            kind,
            value,
            lexeme: lexeme.into(),
            position,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Valor de un literal entero, cero para el resto.
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn line(&self) -> u32 {
        self.position.line()
    }

    /// Registro que nombra este token, si lo hay.
    pub fn register(&self) -> Option<Register> {
        match self.kind {
            TokenKind::Register => self.lexeme.parse().ok(),
            _ => None,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Token) -> bool {
        let same_lexeme = match self.kind {
            TokenKind::Ident | TokenKind::Register => {
                NoCase::new(&self.lexeme) == NoCase::new(&other.lexeme)
            }

            _ => self.lexeme == other.lexeme,
        };

        self.kind == other.kind && self.value == other.value && same_lexeme
    }
}

impl Eq for Token {}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident => write!(fmt, "identifier `{}`", self.lexeme),
            TokenKind::Number => write!(fmt, "literal `{}`", self.lexeme),
            TokenKind::Str => write!(fmt, "string '{}'", self.lexeme),
            TokenKind::Register => write!(fmt, "register `{}`", self.lexeme),
            kind => kind.fmt(fmt),
        }
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: Peekable<S>,
    state: State,
    start: Position,
    next: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante entera, dígitos acumulados hasta el momento.
    Number(String),

    /// Término que puede ser un identificador, palabra clave o registro.
    Word(String),

    /// Directiva que inicia con `.` o `@`.
    Directive(String),

    /// Literal de cadena abierto por `'`.
    Quoted(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(source: S) -> Self {
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start: Position::default(),
            next: Position::default(),
        }
    }

    /// Obtiene el siguiente token.
    ///
    /// Al agotarse la entrada se emite [`TokenKind::Eof`], y se sigue
    /// emitiendo en llamadas posteriores.
    pub fn next_token(&mut self) -> Result<Token, Located<LexerError>> {
        let result = self.lex();
        self.state = State::Start;

        result.map_err(|error| Located::at(error, self.start))
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Token, LexerError> {
        use State::*;

        loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, position))) => {
                    self.next = *position;
                    Some(*c)
                }

                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => return Err(error.into()),
                    _ => unreachable!(),
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Tokens triviales
                (Start, None) => return Ok(self.token(TokenKind::Eof, 0, "")),
                (Start, Some(',')) => self.single(TokenKind::Comma, ','),
                (Start, Some(':')) => self.single(TokenKind::Colon, ':'),
                (Start, Some('[')) => self.single(TokenKind::LBracket, '['),
                (Start, Some(']')) => self.single(TokenKind::RBracket, ']'),
                (Start, Some('(')) => self.single(TokenKind::LParen, '('),
                (Start, Some(')')) => self.single(TokenKind::RParen, ')'),
                (Start, Some('+')) => self.single(TokenKind::Plus, '+'),
                (Start, Some('-')) => self.single(TokenKind::Minus, '-'),
                (Start, Some('?')) => self.single(TokenKind::Question, '?'),
                (Start, Some(';')) => self.state = Comment,
                (Start, Some('\'')) => self.state = Quoted(String::new()),
                (Start, Some(c @ ('.' | '@'))) => self.state = Directive(c.to_string()),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume
                // el dígito, ya que esta lógica ya está implementada
                // en el respectivo caso para un estado de constante.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Number(String::new());
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => return Ok(std::mem::take(token)),

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                // Acumulación de dígitos, incluyendo los hexadecimales
                (Number(digits), Some(c)) if c.is_ascii_hexdigit() => digits.push(c),

                // Sufijo hexadecimal, el token se emite tras consumirlo
                (Number(digits), Some('h' | 'H')) => {
                    let value = parse_int(digits, 16)?;
                    let lexeme = format!("{}h", digits);
                    self.state = Complete(self.token(TokenKind::Number, value, lexeme));
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Number(digits), _) => {
                    let digits = std::mem::take(digits);
                    let value = parse_int(&digits, 10)?;
                    return Ok(self.token(TokenKind::Number, value, digits));
                }

                // Extensión de términos
                (Word(word) | Directive(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let word = std::mem::take(word);
                    let kind = match Keyword::from_str(&word) {
                        Ok(Keyword(kind)) => kind,
                        Err(()) => TokenKind::Ident,
                    };

                    return Ok(self.token(kind, 0, word));
                }

                (Directive(word), _) => {
                    let word = std::mem::take(word);
                    return match DIRECTIVES
                        .iter()
                        .find(|&&(name, _)| NoCase::new(name) == NoCase::new(&word))
                    {
                        Some(&(_, kind)) => Ok(self.token(kind, 0, word)),
                        None => Err(LexerError::UnknownDirective(word)),
                    };
                }

                // Cadenas, sin escapes y sin cruzar líneas
                (Quoted(_), None | Some('\n')) => return Err(LexerError::UnterminatedString),
                (Quoted(string), Some('\'')) => {
                    let string = std::mem::take(string);
                    self.state = Complete(self.token(TokenKind::Str, 0, string));
                }

                (Quoted(string), Some(c)) => string.push(c),
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            self.source.next();
        }
    }

    fn token<L: Into<String>>(&self, kind: TokenKind, value: i64, lexeme: L) -> Token {
        Token::new(kind, value, lexeme, self.start)
    }

    /// Programa la emisión de un token de un solo carácter.
    fn single(&mut self, kind: TokenKind, c: char) {
        self.state = State::Complete(self.token(kind, 0, c.to_string()));
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Token, Located<LexerError>>;

    /// Itera hasta el fin de la entrada, sin incluir [`TokenKind::Eof`].
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) if token.kind() == TokenKind::Eof => None,
            result => Some(result),
        }
    }
}

/// Interpreta los dígitos acumulados de un literal.
fn parse_int(digits: &str, radix: u32) -> Result<i64, LexerError> {
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(LexerError::BadNumber(digits.to_owned()));
    }

    match i64::from_str_radix(digits, radix) {
        Ok(value) if value <= INT_MAX => Ok(value),
        _ => Err(LexerError::IntOverflow),
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$')
}
