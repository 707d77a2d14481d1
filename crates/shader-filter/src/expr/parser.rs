use crate::error::ExpressionError;

use super::{BinOp, CompiledExpr, Environment, Function, Node, Symbol};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

/// Every tree node consumes at least one token, so this also bounds the
/// depth of the compiled tree and of its evaluation.
const MAX_TOKENS: usize = 1024;
/// Parentheses, calls and prefix operators deeper than this are rejected.
const MAX_NESTING: usize = 64;

/// Operators, longest first so `<=` wins over `<`.
const OPERATORS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "^", "<", ">", "!",
];

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal = &text[start..i];
            let value = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::new(start, format!("invalid number '{literal}'")))?;
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(text[start..i].to_string())));
            continue;
        }

        match c {
            b'(' => tokens.push((start, Token::LParen)),
            b')' => tokens.push((start, Token::RParen)),
            b',' => tokens.push((start, Token::Comma)),
            _ => {
                let Some(op) = OPERATORS
                    .iter()
                    .find(|op| text[i..].starts_with(**op))
                else {
                    return Err(ExpressionError::new(
                        start,
                        format!("unexpected character '{}'", text[i..].chars().next().unwrap_or('?')),
                    ));
                };
                tokens.push((start, Token::Op(op)));
                i += op.len();
                continue;
            }
        }
        i += 1;
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
    env: &'a Environment,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::new(self.offset(), message)
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if ops.contains(&op) {
                self.pos += 1;
                return Some(op);
            }
        }
        None
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ExpressionError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else if self.peek().is_none() {
            Err(self.error(format!("expected {what}, found end of expression")))
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Node, ExpressionError>,
    ) -> Result<Node, ExpressionError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Node::Binary(bin_op(op), Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["||"], Self::and)
    }

    fn and(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["&&"], Self::equality)
    }

    fn equality(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["==", "!="], Self::relational)
    }

    fn relational(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["<", "<=", ">", ">="], Self::additive)
    }

    fn additive(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Node, ExpressionError> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Node, ExpressionError> {
        match self.eat_op(&["-", "+", "!"]) {
            Some("-") => Ok(Node::Neg(Box::new(self.nested(Self::unary)?))),
            Some("!") => Ok(Node::Not(Box::new(self.nested(Self::unary)?))),
            Some(_) => self.nested(Self::unary),
            None => self.power(),
        }
    }

    // `^` binds tighter than unary minus and is right-associative.
    fn power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.primary()?;
        if self.eat_op(&["^"]).is_some() {
            let exponent = self.nested(Self::unary)?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExpressionError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Number(v)) => Ok(Node::Number(v)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.nested(|p| p.identifier(&name, offset)),
            Some(_) => Err(ExpressionError::new(offset, "unexpected token")),
            None => Err(ExpressionError::new(offset, "unexpected end of expression")),
        }
    }

    fn identifier(&mut self, name: &str, offset: usize) -> Result<Node, ExpressionError> {
        match self.env.lookup(name) {
            Some(Symbol::Variable(cell)) => Ok(Node::Var(cell.clone())),
            Some(Symbol::Constant(v)) => {
                // Allow `pi()` style calls on constants.
                if self.peek() == Some(&Token::LParen)
                    && self.tokens.get(self.pos + 1).map(|(_, t)| t) == Some(&Token::RParen)
                {
                    self.pos += 2;
                }
                Ok(Node::Number(*v))
            }
            Some(Symbol::Function(function)) => {
                let function = *function;
                let args = self.arguments(name)?;
                if args.len() != function.arity() {
                    return Err(ExpressionError::new(
                        offset,
                        format!(
                            "function '{name}' expects {} argument(s), got {}",
                            function.arity(),
                            args.len()
                        ),
                    ));
                }
                let mut args = args.into_iter().map(Box::new);
                let mut arg = || args.next().unwrap_or_else(|| Box::new(Node::Number(0.0)));
                Ok(match function {
                    Function::Unary(f) => Node::Call1(f, arg()),
                    Function::Binary(f) => Node::Call2(f, arg(), arg()),
                    Function::Ternary(f) => Node::Call3(f, arg(), arg(), arg()),
                    Function::Random => Node::Random(self.env.rng(), arg(), arg()),
                })
            }
            None => Err(ExpressionError::new(
                offset,
                format!("unknown identifier '{name}'"),
            )),
        }
    }

    fn arguments(&mut self, name: &str) -> Result<Vec<Node>, ExpressionError> {
        if self.peek() != Some(&Token::LParen) {
            // Unary functions may be applied without parentheses: `sin x`.
            return Ok(vec![self.power()?]);
        }
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.or()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or ')' in call to '{name}'")));
                }
                None => {
                    return Err(self.error(format!("unterminated call to '{name}'")));
                }
            }
        }
        Ok(args)
    }
}

fn bin_op(op: &str) -> BinOp {
    match op {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        "^" => BinOp::Pow,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "&&" => BinOp::And,
        _ => BinOp::Or,
    }
}

/// Compile `text` against `env`. Variables resolve to the environment's cells
/// at compile time, so expressions must be recompiled after the environment
/// is cleared.
pub fn compile(text: &str, env: &Environment) -> Result<CompiledExpr, ExpressionError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ExpressionError::new(0, "empty expression"));
    }
    if let Some((offset, _)) = tokens.get(MAX_TOKENS) {
        return Err(ExpressionError::new(*offset, "expression too long"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
        env,
    };
    let root = parser.or()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(CompiledExpr::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::builtins;

    fn eval(text: &str) -> f64 {
        let mut env = Environment::new(Some(0));
        builtins::install(&mut env);
        compile(text, &env).unwrap().eval()
    }

    fn err(text: &str) -> ExpressionError {
        let mut env = Environment::new(Some(0));
        builtins::install(&mut env);
        compile(text, &env).unwrap_err()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn precedence() {
        assert!(approx_eq(eval("1 + 2 * 3"), 7.0));
        assert!(approx_eq(eval("(1 + 2) * 3"), 9.0));
        assert!(approx_eq(eval("2 ^ 3 ^ 2"), 512.0));
        assert!(approx_eq(eval("-2 ^ 2"), -4.0));
        assert!(approx_eq(eval("10 % 4"), 2.0));
        assert!(approx_eq(eval("1 + 2 < 4"), 1.0));
        assert!(approx_eq(eval("1 < 2 == 1"), 1.0));
    }

    #[test]
    fn numbers_with_exponent_and_leading_dot() {
        assert!(approx_eq(eval("1.5e2"), 150.0));
        assert!(approx_eq(eval(".5 + 2E-1"), 0.7));
    }

    #[test]
    fn calls_and_constants() {
        assert!(approx_eq(eval("pow(2, 10)"), 1024.0));
        assert!(approx_eq(eval("degrees(pi)"), 180.0));
        assert!(approx_eq(eval("pi() * 0"), 0.0));
        assert!(approx_eq(eval("sqrt 16"), 4.0));
        assert!(approx_eq(eval("int_max"), f64::from(i32::MAX)));
    }

    #[test]
    fn errors_report_offsets() {
        let e = err("x +");
        assert_eq!(e.message, "unknown identifier 'x'");
        assert_eq!(e.offset, 0);

        let e = err("1 +");
        assert_eq!(e.message, "unexpected end of expression");
        assert_eq!(e.offset, 3);

        let e = err("clamp(1, 2)");
        assert!(e.message.contains("expects 3"));

        let e = err("(1 + 2");
        assert!(e.message.contains("')'"));

        let e = err("1 2");
        assert_eq!(e.message, "unexpected trailing input");
        assert_eq!(e.offset, 2);

        let e = err("1 # 2");
        assert!(e.message.contains("unexpected character"));

        assert_eq!(err("   ").message, "empty expression");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(err(&deep).message, "expression too long");

        let nested = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        let e = err(&nested);
        assert_eq!(e.message, "expression nested too deeply");
        assert_eq!(e.offset, MAX_NESTING + 1);

        assert_eq!(err(&format!("{}1", "-".repeat(200))).message, "expression nested too deeply");
        let calls = format!("{}1{}", "abs(".repeat(100), ")".repeat(100));
        assert_eq!(err(&calls).message, "expression nested too deeply");

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(approx_eq(eval(&shallow), 1.0));
    }

    #[test]
    fn long_chains_are_bounded() {
        let huge = vec!["1"; 10_000].join("+");
        assert_eq!(err(&huge).message, "expression too long");

        let long = vec!["1"; 500].join("+");
        assert!(approx_eq(eval(&long), 500.0));
        let powers = vec!["2"; 3].join("^") + &"^1".repeat(40);
        assert!(approx_eq(eval(&powers), 16.0));
    }
}
