//! ABOUTME: Tokenizer and recursive-descent parser for Direct expressions
//! ABOUTME: Produces an Ast the evaluator walks against the merged environment

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Literal(Value),
    Ident(String),
    Member(Box<Ast>, String),
    Index(Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
    Lambda(String, Box<Ast>),
    Unary(UnOp, Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
    Ternary(Box<Ast>, Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
    Eof,
}

pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Tok>, ParseError> {
        let mut toks = Vec::new();
        loop {
            self.skip_ws();
            let Some(&(i, c)) = self.chars.peek() else {
                toks.push(Tok::Eof);
                break;
            };
            if c.is_ascii_digit() {
                toks.push(self.lex_number());
            } else if c == '\'' || c == '"' {
                toks.push(self.lex_string(c)?);
            } else if c.is_alphabetic() || c == '_' {
                toks.push(self.lex_ident());
            } else {
                toks.push(self.lex_punct(i)?);
            }
        }
        Ok(toks)
    }

    fn skip_ws(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self) -> Tok {
        let start = self.chars.peek().unwrap().0;
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.src[start..end];
        Tok::Number(text.parse().unwrap_or(0.0))
    }

    fn lex_string(&mut self, quote: char) -> Result<Tok, ParseError> {
        self.chars.next(); // consume opening quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(Tok::Str(s)),
                Some((_, '\\')) => {
                    if let Some((_, esc)) = self.chars.next() {
                        s.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                Some((_, c)) => s.push(c),
                None => return Err(ParseError("unterminated string literal".into())),
            }
        }
    }

    fn lex_ident(&mut self) -> Tok {
        let start = self.chars.peek().unwrap().0;
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Tok::Ident(self.src[start..end].to_string())
    }

    fn lex_punct(&mut self, i: usize) -> Result<Tok, ParseError> {
        let two = self.src.get(i..i + 2);
        for op in ["==", "!=", ">=", "<=", "&&", "||", "=>"] {
            if two == Some(op) {
                self.chars.next();
                self.chars.next();
                return Ok(Tok::Punct(op));
            }
        }
        let (_, c) = self.chars.next().unwrap();
        let p: &'static str = match c {
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            '.' => ".",
            ',' => ",",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '!' => "!",
            '<' => "<",
            '>' => ">",
            '?' => "?",
            ':' => ":",
            other => return Err(ParseError(format!("unexpected character '{other}'"))),
        };
        Ok(Tok::Punct(p))
    }
}

pub struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    pub fn parse(src: &str) -> Result<Ast, ParseError> {
        let toks = Lexer::new(src).tokenize()?;
        let mut parser = Self { toks, pos: 0 };
        let ast = parser.ternary()?;
        if !matches!(parser.peek(), Tok::Eof) {
            return Err(ParseError(format!(
                "trailing input after expression at token {}",
                parser.pos
            )));
        }
        Ok(ast)
    }

    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if matches!(self.peek(), Tok::Punct(x) if *x == p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(ParseError(format!("expected '{p}'")))
        }
    }

    fn ternary(&mut self) -> Result<Ast, ParseError> {
        let cond = self.or_expr()?;
        if self.eat_punct("?") {
            let then_branch = self.ternary()?;
            self.expect_punct(":")?;
            let else_branch = self.ternary()?;
            return Ok(Ast::Ternary(
                Box::new(cond),
                Box::new(then_branch),
                Box::new(else_branch),
            ));
        }
        Ok(cond)
    }

    fn or_expr(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.eat_punct("||") {
            let rhs = self.and_expr()?;
            lhs = Ast::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.equality()?;
        while self.eat_punct("&&") {
            let rhs = self.equality()?;
            lhs = Ast::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.relational()?;
        loop {
            let op = if self.eat_punct("==") {
                BinOp::Eq
            } else if self.eat_punct("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let rhs = self.relational()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat_punct(">=") {
                BinOp::Ge
            } else if self.eat_punct("<=") {
                BinOp::Le
            } else if self.eat_punct(">") {
                BinOp::Gt
            } else if self.eat_punct("<") {
                BinOp::Lt
            } else {
                break;
            };
            let rhs = self.additive()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOp::Add
            } else if self.eat_punct("-") {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.multiplicative()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOp::Mul
            } else if self.eat_punct("/") {
                BinOp::Div
            } else if self.eat_punct("%") {
                BinOp::Mod
            } else {
                break;
            };
            let rhs = self.unary()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, ParseError> {
        if self.eat_punct("!") {
            return Ok(Ast::Unary(UnOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Ast::Unary(UnOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Ast, ParseError> {
        let mut node = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let Tok::Ident(name) = self.advance() else {
                    return Err(ParseError("expected identifier after '.'".into()));
                };
                if self.eat_punct("(") {
                    let args = self.arg_list()?;
                    node = Ast::Call(format!("{name}@method"), {
                        let mut all = vec![node];
                        all.extend(args);
                        all
                    });
                    continue;
                }
                node = Ast::Member(Box::new(node), name);
            } else if self.eat_punct("[") {
                let index = self.ternary()?;
                self.expect_punct("]")?;
                node = Ast::Index(Box::new(node), Box::new(index));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn arg_list(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.lambda_or_ternary()?);
            if self.eat_punct(",") {
                continue;
            }
            self.expect_punct(")")?;
            break;
        }
        Ok(args)
    }

    fn lambda_or_ternary(&mut self) -> Result<Ast, ParseError> {
        if let Tok::Ident(name) = self.peek().clone() {
            if matches!(self.toks.get(self.pos + 1), Some(Tok::Punct("=>"))) {
                self.advance();
                self.advance();
                let body = self.ternary()?;
                return Ok(Ast::Lambda(name, Box::new(body)));
            }
        }
        self.ternary()
    }

    fn primary(&mut self) -> Result<Ast, ParseError> {
        match self.advance() {
            Tok::Number(n) => Ok(Ast::Literal(serde_json::json!(n))),
            Tok::Str(s) => Ok(Ast::Literal(Value::String(s))),
            Tok::Ident(name) => {
                if name == "true" {
                    return Ok(Ast::Literal(Value::Bool(true)));
                }
                if name == "false" {
                    return Ok(Ast::Literal(Value::Bool(false)));
                }
                if name == "null" || name == "nil" {
                    return Ok(Ast::Literal(Value::Null));
                }
                if self.eat_punct("(") {
                    let args = self.arg_list()?;
                    return Ok(Ast::Call(name, args));
                }
                Ok(Ast::Ident(name))
            }
            Tok::Punct("(") => {
                let inner = self.ternary()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Punct("[") => {
                let mut items = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat_punct(",") {
                            continue;
                        }
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(Ast::Call("@array".into(), items))
            }
            other => Err(ParseError(format!("unexpected token: {other:?}"))),
        }
    }
}
