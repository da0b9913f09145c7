//! Intérprete mínimo del subconjunto de WSL que emite el traductor.
//!
//! Solo existe para las pruebas: ejecuta el programa generado y expone el
//! estado final de sus variables, de modo que las pruebas comparan
//! comportamiento y no únicamente texto.

#![allow(dead_code)]

use asm2wsl::config::Config;
use std::collections::HashMap;

/// Límite de sentencias ejecutadas por programa.
const FUEL: usize = 1_000_000;

const TERMINATORS: &[&str] = &["END", "ELSE", "ELSIF", "FI", "ENDACTIONS"];

/// Traduce con un puntero de datos fijo.
pub fn translate(source: &str) -> String {
    let config = Config::default().with_data_pointer(0x0abc);
    match asm2wsl::translate_with(source.as_bytes(), &config) {
        Ok(program) => program,
        Err(error) => panic!("translation failed: {}", error),
    }
}

/// Ejecuta un programa. `presets` sobrescribe valores iniciales.
pub fn run(wsl: &str, presets: &[(&str, i64)]) -> Machine {
    let program = Parser::new(wsl).program();
    let mut machine = Machine {
        vars: HashMap::new(),
        printed: String::new(),
        fuel: FUEL,
    };

    for (name, init) in &program.decls {
        let value = machine.eval(init);
        machine.vars.insert(name.clone(), value);
    }

    for &(name, value) in presets {
        machine.vars.insert(name.to_owned(), Value::Int(value));
    }

    machine.system(&program, &program.main);
    machine
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    Seq(Vec<Value>),
}

impl Value {
    fn int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            other => panic!("not an integer: {:?}", other),
        }
    }
}

pub struct Machine {
    vars: HashMap<String, Value>,
    pub printed: String,
    fuel: usize,
}

impl Machine {
    pub fn get(&self, name: &str) -> i64 {
        self.value(name).int()
    }

    pub fn value(&self, name: &str) -> &Value {
        self.vars
            .get(name)
            .unwrap_or_else(|| panic!("undeclared variable `{}`", name))
    }

    fn system(&mut self, program: &Program, system: &ActionSystem) {
        let mut current = system.start.clone();
        loop {
            let body = system
                .actions
                .get(&current)
                .unwrap_or_else(|| panic!("undefined action `{}`", current));

            match self.block(program, body) {
                Flow::Call(next) if next == "Z" => return,
                Flow::Call(next) => current = next,
                Flow::Normal => panic!("action `{}` does not end in a call", current),
            }
        }
    }

    fn block(&mut self, program: &Program, block: &[Stmt]) -> Flow {
        for statement in block {
            if let Flow::Call(target) = self.statement(program, statement) {
                return Flow::Call(target);
            }
        }

        Flow::Normal
    }

    fn statement(&mut self, program: &Program, statement: &Stmt) -> Flow {
        self.fuel = self.fuel.checked_sub(1).expect("out of fuel");

        match statement {
            Stmt::Assign(assignments) => {
                let values: Vec<_> = assignments.iter().map(|(_, e)| self.eval(e)).collect();
                for ((place, _), value) in assignments.iter().zip(values) {
                    self.store(place, value);
                }
            }

            Stmt::If(branches, otherwise) => {
                for (condition, body) in branches {
                    if self.condition(condition) {
                        return self.block(program, body);
                    }
                }

                return self.block(program, otherwise);
            }

            Stmt::Call(target) => return Flow::Call(target.clone()),

            Stmt::ProcCall(name) => {
                let system = program
                    .procs
                    .get(name)
                    .unwrap_or_else(|| panic!("undefined procedure `{}`", name));

                self.system(program, system);
            }

            Stmt::Push(stack, value) => {
                let value = self.eval(value);
                match self.vars.get_mut(stack) {
                    Some(Value::Seq(items)) => items.push(value),
                    other => panic!("bad stack: {:?}", other),
                }
            }

            Stmt::Pop(target, stack) => {
                let value = match self.vars.get_mut(stack) {
                    Some(Value::Seq(items)) => items.pop().expect("empty stack"),
                    other => panic!("bad stack: {:?}", other),
                };

                self.vars.insert(target.clone(), value);
            }

            Stmt::Print(value) => match self.eval(value) {
                Value::Str(string) => self.printed.push_str(&string),
                other => self.printed.push_str(&format!("{:?}", other)),
            },
        }

        Flow::Normal
    }

    fn store(&mut self, place: &Place, value: Value) {
        match place {
            Place::Var(name) => {
                self.vars.insert(name.clone(), value);
            }

            Place::Index(name, index) => {
                let index = self.eval(index).int();
                match self.vars.get_mut(name) {
                    Some(Value::Seq(items)) => items[index as usize - 1] = value,
                    other => panic!("not a sequence: {:?}", other),
                }
            }
        }
    }

    fn condition(&mut self, condition: &Cond) -> bool {
        match condition {
            Cond::Or(a, b) => self.condition(a) || self.condition(b),
            Cond::And(a, b) => self.condition(a) && self.condition(b),
            Cond::Cmp(a, op, b) => {
                let (a, b) = (self.eval(a), self.eval(b));
                match *op {
                    "=" => a == b,
                    "<>" => a != b,
                    "<" => a.int() < b.int(),
                    ">" => a.int() > b.int(),
                    "<=" => a.int() <= b.int(),
                    ">=" => a.int() >= b.int(),
                    _ => unreachable!(),
                }
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Num(n) => Value::Int(*n),
            Expr::Str(string) => Value::Str(string.clone()),
            Expr::Var(name) => self.value(name).clone(),
            Expr::Seq(items) => Value::Seq(items.iter().map(|e| self.eval(e)).collect()),
            Expr::Ascii(code) => {
                let code = self.eval(code).int();
                Value::Str(char::from(code as u8).to_string())
            }

            Expr::Index(name, index) => {
                let index = self.eval(index).int();
                match self.value(name) {
                    Value::Seq(items) => items[index as usize - 1].clone(),
                    other => panic!("not a sequence: {:?}", other),
                }
            }

            Expr::Bin(a, op, b) => {
                let (a, b) = (self.eval(a).int(), self.eval(b).int());
                Value::Int(match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => a.div_euclid(b),
                    Op::Mod => a.rem_euclid(b),
                    Op::Pow => a.pow(b as u32),
                })
            }
        }
    }
}

enum Flow {
    Normal,
    Call(String),
}

struct Program {
    decls: Vec<(String, Expr)>,
    main: ActionSystem,
    procs: HashMap<String, ActionSystem>,
}

struct ActionSystem {
    start: String,
    actions: HashMap<String, Vec<Stmt>>,
}

enum Stmt {
    Assign(Vec<(Place, Expr)>),
    If(Vec<(Cond, Vec<Stmt>)>, Vec<Stmt>),
    Call(String),
    ProcCall(String),
    Push(String, Expr),
    Pop(String, String),
    Print(Expr),
}

enum Place {
    Var(String),
    Index(String, Expr),
}

enum Cond {
    Or(Box<Cond>, Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Cmp(Expr, &'static str, Expr),
}

enum Expr {
    Num(i64),
    Str(String),
    Var(String),
    Index(String, Box<Expr>),
    Seq(Vec<Expr>),
    Ascii(Box<Expr>),
    Bin(Box<Expr>, Op, Box<Expr>),
}

enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Num(i64),
    Str(String),
    Sym(&'static str),
}

const SYMBOLS: &[&str] = &[
    ":=", "==", "<>", "<=", ">=", "**", "<", ">", "=", "*", "+", "-", "(", ")", "[", "]", ",",
    ";", ":",
];

fn tokenize(source: &str) -> Vec<Tok> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }

            let digits: String = chars[start..i].iter().collect();
            tokens.push(Tok::Num(digits.parse().unwrap()));
        } else if c.is_ascii_alphabetic() || c == '_' || c == '@' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || "_@$".contains(chars[i])) {
                i += 1;
            }

            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if c == '"' {
            i += 1;
            while chars[i] != '"' {
                i += 1;
            }

            tokens.push(Tok::Str(chars[start + 1..i].iter().collect()));
            i += 1;
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let symbol = SYMBOLS
                .iter()
                .copied()
                .find(|symbol| rest.starts_with(symbol))
                .unwrap_or_else(|| panic!("unexpected character {:?}", c));

            tokens.push(Tok::Sym(symbol));
            i += symbol.len();
        }
    }

    tokens
}

struct Parser {
    tokens: Vec<Tok>,
    next: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Parser {
            tokens: tokenize(source),
            next: 0,
        }
    }

    fn program(&mut self) -> Program {
        self.keyword("VAR");
        self.symbol("<");

        let mut decls = Vec::new();
        loop {
            let name = self.ident();
            self.symbol(":=");
            decls.push((name, self.expr()));

            if !self.eat_symbol(",") {
                break;
            }
        }

        self.symbol(">");
        self.symbol(":");

        let nested = self.eat_keyword("BEGIN");
        let main = self.actions();

        let mut procs = HashMap::new();
        if nested {
            self.keyword("WHERE");
            while self.eat_keyword("PROC") {
                let name = self.ident();
                self.symbol("(");
                self.symbol(")");
                self.symbol("==");
                procs.insert(name, self.actions());
                self.keyword("END");
            }

            self.keyword("END");
        }

        self.keyword("ENDVAR");
        assert_eq!(self.next, self.tokens.len(), "trailing tokens");

        Program { decls, main, procs }
    }

    fn actions(&mut self) -> ActionSystem {
        self.keyword("ACTIONS");
        let start = self.ident();
        self.symbol(":");

        let mut actions = HashMap::new();
        while !self.eat_keyword("ENDACTIONS") {
            let name = self.ident();
            self.symbol("==");
            let body = self.block();
            self.keyword("END");

            assert!(actions.insert(name.clone(), body).is_none(), "duplicate action `{}`", name);
        }

        ActionSystem { start, actions }
    }

    fn block(&mut self) -> Vec<Stmt> {
        let mut block = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Ident(word)) if TERMINATORS.contains(&word.as_str()) => break,
                _ => block.push(self.statement()),
            }

            self.eat_symbol(";");
        }

        block
    }

    fn statement(&mut self) -> Stmt {
        if self.eat_symbol("<") {
            let mut assignments = Vec::new();
            loop {
                let place = self.place();
                self.symbol(":=");
                assignments.push((place, self.expr()));

                if !self.eat_symbol(",") {
                    break;
                }
            }

            self.symbol(">");
            return Stmt::Assign(assignments);
        }

        let word = self.ident();
        match word.as_str() {
            "IF" => {
                let mut branches = Vec::new();
                loop {
                    let condition = self.condition();
                    self.keyword("THEN");
                    branches.push((condition, self.block()));

                    if !self.eat_keyword("ELSIF") {
                        break;
                    }
                }

                let otherwise = if self.eat_keyword("ELSE") {
                    self.block()
                } else {
                    Vec::new()
                };

                self.keyword("FI");
                Stmt::If(branches, otherwise)
            }

            "CALL" => Stmt::Call(self.ident()),

            "PUSH" => {
                self.symbol("(");
                let stack = self.ident();
                self.symbol(",");
                let value = self.expr();
                self.symbol(")");
                Stmt::Push(stack, value)
            }

            "POP" => {
                self.symbol("(");
                let target = self.ident();
                self.symbol(",");
                let stack = self.ident();
                self.symbol(")");
                Stmt::Pop(target, stack)
            }

            "PRINT" => {
                self.symbol("(");
                let value = self.expr();
                self.symbol(")");
                Stmt::Print(value)
            }

            _ if self.eat_symbol("(") => {
                self.symbol(")");
                Stmt::ProcCall(word.clone())
            }

            _ => {
                self.next -= 1;
                let place = self.place();
                self.symbol(":=");
                Stmt::Assign(vec![(place, self.expr())])
            }
        }
    }

    fn place(&mut self) -> Place {
        let name = self.ident();
        if self.eat_symbol("[") {
            let index = self.expr();
            self.symbol("]");
            Place::Index(name, index)
        } else {
            Place::Var(name)
        }
    }

    fn condition(&mut self) -> Cond {
        let mut condition = self.conjunction();
        while self.eat_keyword("OR") {
            condition = Cond::Or(Box::new(condition), Box::new(self.conjunction()));
        }

        condition
    }

    fn conjunction(&mut self) -> Cond {
        let mut condition = self.comparison();
        while self.eat_keyword("AND") {
            condition = Cond::And(Box::new(condition), Box::new(self.comparison()));
        }

        condition
    }

    fn comparison(&mut self) -> Cond {
        let lhs = self.expr();
        let op = match self.advance() {
            Tok::Sym(op @ ("=" | "<>" | "<" | ">" | "<=" | ">=")) => op,
            other => panic!("expected comparison, found {:?}", other),
        };

        Cond::Cmp(lhs, op, self.expr())
    }

    fn expr(&mut self) -> Expr {
        let mut expr = self.term();
        loop {
            let op = if self.eat_symbol("+") {
                Op::Add
            } else if self.eat_symbol("-") {
                Op::Sub
            } else {
                break expr;
            };

            expr = Expr::Bin(Box::new(expr), op, Box::new(self.term()));
        }
    }

    fn term(&mut self) -> Expr {
        let mut expr = self.power();
        loop {
            let op = if self.eat_symbol("*") {
                Op::Mul
            } else if self.eat_keyword("DIV") {
                Op::Div
            } else if self.eat_keyword("MOD") {
                Op::Mod
            } else {
                break expr;
            };

            expr = Expr::Bin(Box::new(expr), op, Box::new(self.power()));
        }
    }

    fn power(&mut self) -> Expr {
        let base = self.primary();
        if self.eat_symbol("**") {
            Expr::Bin(Box::new(base), Op::Pow, Box::new(self.power()))
        } else {
            base
        }
    }

    fn primary(&mut self) -> Expr {
        match self.advance() {
            Tok::Num(n) => Expr::Num(n),
            Tok::Str(string) => Expr::Str(string),

            Tok::Sym("(") => {
                let expr = self.expr();
                self.symbol(")");
                expr
            }

            Tok::Sym("<") => {
                let mut items = Vec::new();
                if !self.eat_symbol(">") {
                    loop {
                        items.push(self.expr());
                        if !self.eat_symbol(",") {
                            break;
                        }
                    }

                    self.symbol(">");
                }

                Expr::Seq(items)
            }

            Tok::Ident(name) if name == "@ASCII_To_String" => {
                self.symbol("(");
                let code = self.expr();
                self.symbol(")");
                Expr::Ascii(Box::new(code))
            }

            Tok::Ident(name) if self.eat_symbol("[") => {
                let index = self.expr();
                self.symbol("]");
                Expr::Index(name, Box::new(index))
            }

            Tok::Ident(name) => Expr::Var(name),
            other => panic!("expected expression, found {:?}", other),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.next)
    }

    fn advance(&mut self) -> Tok {
        let token = self.tokens.get(self.next).cloned().expect("unexpected end");
        self.next += 1;
        token
    }

    fn ident(&mut self) -> String {
        match self.advance() {
            Tok::Ident(name) => name,
            other => panic!("expected identifier, found {:?}", other),
        }
    }

    fn keyword(&mut self, keyword: &str) {
        assert!(self.eat_keyword(keyword), "expected {}, found {:?}", keyword, self.peek());
    }

    fn symbol(&mut self, symbol: &str) {
        assert!(self.eat_symbol(symbol), "expected `{}`, found {:?}", symbol, self.peek());
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = matches!(self.peek(), Some(Tok::Ident(word)) if word == keyword);
        self.next += found as usize;
        found
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = matches!(self.peek(), Some(Tok::Sym(s)) if *s == symbol);
        self.next += found as usize;
        found
    }
}
