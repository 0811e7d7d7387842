//! Restricted arithmetic evaluator for product-type volume formulas.
//!
//! A formula is tokenized and parsed into an [`Expr`] tree once, then
//! evaluated against named parameter values. Supported syntax:
//!
//! - binary `+ - * /`, exponentiation `^` or `**` (right associative)
//! - unary `+` / `-`, parentheses
//! - numeric literals with optional fraction and exponent (`2`, `.5`, `1e-3`)
//! - variables bound from the calculation parameters
//! - constants `pi`, `PI`, `M_PI`
//! - functions `sqrt`, `pow`, `abs`, `min`, `max`, `round`, `floor`, `ceil`, `pi()`
//!
//! Anything else is rejected with a [`FormulaError`].

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
  #[error("Formula is empty")]
  Empty,
  #[error("Unexpected character '{0}' at position {1}")]
  UnexpectedChar(char, usize),
  #[error("Invalid number '{0}'")]
  InvalidNumber(String),
  #[error("Unexpected end of formula")]
  UnexpectedEnd,
  #[error("Unexpected token '{0}'")]
  UnexpectedToken(String),
  #[error("Unknown function '{0}'")]
  UnknownFunction(String),
  #[error("Function '{name}' expects {expected} argument(s), got {got}")]
  Arity {
    name: &'static str,
    expected: &'static str,
    got: usize,
  },
  #[error("Unknown variable '{0}'")]
  UnknownVariable(String),
  #[error("Division by zero")]
  DivisionByZero,
  #[error("Formula result is not a finite number")]
  NonFinite,
  #[error("Formula is longer than {0} characters")]
  TooLong(usize),
  #[error("Formula is nested deeper than {0} levels")]
  TooDeep(usize),
}

/// Longest accepted formula source, in characters
pub const MAX_FORMULA_LEN: usize = 1000;
/// Deepest accepted nesting of parentheses, signs and powers
pub const MAX_DEPTH: usize = 64;

// ==================== Tokens ====================

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Number(f64),
  Ident(String),
  Plus,
  Minus,
  Star,
  Slash,
  Caret,
  LParen,
  RParen,
  Comma,
}

impl std::fmt::Display for Token {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Token::Number(n) => write!(f, "{}", n),
      Token::Ident(s) => f.write_str(s),
      Token::Plus => f.write_str("+"),
      Token::Minus => f.write_str("-"),
      Token::Star => f.write_str("*"),
      Token::Slash => f.write_str("/"),
      Token::Caret => f.write_str("^"),
      Token::LParen => f.write_str("("),
      Token::RParen => f.write_str(")"),
      Token::Comma => f.write_str(","),
    }
  }
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
  let chars: Vec<char> = source.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    match c {
      c if c.is_whitespace() => i += 1,
      '0'..='9' | '.' => {
        let start = i;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
          i += 1;
        }
        // Exponent part only when followed by digits
        if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
          let mut j = i + 1;
          if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
          }
          if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
              j += 1;
            }
            i = j;
          }
        }
        let text: String = chars[start..i].iter().collect();
        let value = text
          .parse::<f64>()
          .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
        tokens.push(Token::Number(value));
      }
      c if c.is_ascii_alphabetic() || c == '_' => {
        let start = i;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
          i += 1;
        }
        tokens.push(Token::Ident(chars[start..i].iter().collect()));
      }
      '+' => {
        tokens.push(Token::Plus);
        i += 1;
      }
      '-' => {
        tokens.push(Token::Minus);
        i += 1;
      }
      '*' => {
        if chars.get(i + 1) == Some(&'*') {
          tokens.push(Token::Caret);
          i += 2;
        } else {
          tokens.push(Token::Star);
          i += 1;
        }
      }
      '/' => {
        tokens.push(Token::Slash);
        i += 1;
      }
      '^' => {
        tokens.push(Token::Caret);
        i += 1;
      }
      '(' => {
        tokens.push(Token::LParen);
        i += 1;
      }
      ')' => {
        tokens.push(Token::RParen);
        i += 1;
      }
      ',' => {
        tokens.push(Token::Comma);
        i += 1;
      }
      other => return Err(FormulaError::UnexpectedChar(other, i)),
    }
  }

  Ok(tokens)
}

// ==================== Syntax Tree ====================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Function {
  Sqrt,
  Pow,
  Abs,
  Min,
  Max,
  Round,
  Floor,
  Ceil,
  Pi,
}

impl Function {
  fn from_name(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "sqrt" => Some(Self::Sqrt),
      "pow" => Some(Self::Pow),
      "abs" => Some(Self::Abs),
      "min" => Some(Self::Min),
      "max" => Some(Self::Max),
      "round" => Some(Self::Round),
      "floor" => Some(Self::Floor),
      "ceil" => Some(Self::Ceil),
      "pi" => Some(Self::Pi),
      _ => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Sqrt => "sqrt",
      Self::Pow => "pow",
      Self::Abs => "abs",
      Self::Min => "min",
      Self::Max => "max",
      Self::Round => "round",
      Self::Floor => "floor",
      Self::Ceil => "ceil",
      Self::Pi => "pi",
    }
  }

  fn check_arity(&self, got: usize) -> Result<(), FormulaError> {
    let (ok, expected) = match self {
      Self::Pi => (got == 0, "0"),
      Self::Sqrt | Self::Abs | Self::Floor | Self::Ceil => (got == 1, "1"),
      Self::Pow => (got == 2, "2"),
      Self::Round => (got == 1 || got == 2, "1 or 2"),
      Self::Min | Self::Max => (got >= 1, "at least 1"),
    };
    if ok {
      Ok(())
    } else {
      Err(FormulaError::Arity {
        name: self.name(),
        expected,
        got,
      })
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Number(f64),
  Var(String),
  Neg(Box<Expr>),
  Binary(BinaryOp, Box<Expr>, Box<Expr>),
  Call(Function, Vec<Expr>),
}

// ==================== Parser ====================

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
    match self.next() {
      Some(t) if t == expected => Ok(()),
      Some(t) => Err(FormulaError::UnexpectedToken(t.to_string())),
      None => Err(FormulaError::UnexpectedEnd),
    }
  }

  // expr := term (('+' | '-') term)*
  fn expr(&mut self) -> Result<Expr, FormulaError> {
    let mut lhs = self.term()?;
    loop {
      let op = match self.peek() {
        Some(Token::Plus) => BinaryOp::Add,
        Some(Token::Minus) => BinaryOp::Sub,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.term()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  // term := unary (('*' | '/') unary)*
  fn term(&mut self) -> Result<Expr, FormulaError> {
    let mut lhs = self.unary()?;
    loop {
      let op = match self.peek() {
        Some(Token::Star) => BinaryOp::Mul,
        Some(Token::Slash) => BinaryOp::Div,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.unary()?;
      lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
  }

  // unary := ('+' | '-') unary | power
  //
  // Every recursive rule passes through here, so this is where nesting is
  // bounded.
  fn unary(&mut self) -> Result<Expr, FormulaError> {
    if self.depth >= MAX_DEPTH {
      return Err(FormulaError::TooDeep(MAX_DEPTH));
    }
    self.depth += 1;
    let expr = self.unary_inner();
    self.depth -= 1;
    expr
  }

  fn unary_inner(&mut self) -> Result<Expr, FormulaError> {
    match self.peek() {
      Some(Token::Minus) => {
        self.pos += 1;
        Ok(Expr::Neg(Box::new(self.unary()?)))
      }
      Some(Token::Plus) => {
        self.pos += 1;
        self.unary()
      }
      _ => self.power(),
    }
  }

  // power := primary ('^' unary)?    -2^2 == -(2^2), 2^3^2 == 2^(3^2)
  fn power(&mut self) -> Result<Expr, FormulaError> {
    let base = self.primary()?;
    if self.peek() == Some(&Token::Caret) {
      self.pos += 1;
      let exponent = self.unary()?;
      return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
    }
    Ok(base)
  }

  fn primary(&mut self) -> Result<Expr, FormulaError> {
    match self.next() {
      Some(Token::Number(n)) => Ok(Expr::Number(n)),
      Some(Token::LParen) => {
        let inner = self.expr()?;
        self.expect(Token::RParen)?;
        Ok(inner)
      }
      Some(Token::Ident(name)) => {
        if self.peek() != Some(&Token::LParen) {
          return Ok(Expr::Var(name));
        }
        let function =
          Function::from_name(&name).ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
        self.pos += 1;
        let args = self.arguments()?;
        function.check_arity(args.len())?;
        Ok(Expr::Call(function, args))
      }
      Some(other) => Err(FormulaError::UnexpectedToken(other.to_string())),
      None => Err(FormulaError::UnexpectedEnd),
    }
  }

  /// Comma-separated arguments after an opening parenthesis
  fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
    let mut args = Vec::new();
    if self.peek() == Some(&Token::RParen) {
      self.pos += 1;
      return Ok(args);
    }
    loop {
      args.push(self.expr()?);
      match self.next() {
        Some(Token::Comma) => continue,
        Some(Token::RParen) => return Ok(args),
        Some(other) => return Err(FormulaError::UnexpectedToken(other.to_string())),
        None => return Err(FormulaError::UnexpectedEnd),
      }
    }
  }
}

// ==================== Evaluation ====================

/// A parsed formula, ready to be evaluated any number of times
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
  root: Expr,
}

impl Formula {
  /// Parse a formula, rejecting syntax errors and unknown functions
  pub fn parse(source: &str) -> Result<Self, FormulaError> {
    if source.chars().count() > MAX_FORMULA_LEN {
      return Err(FormulaError::TooLong(MAX_FORMULA_LEN));
    }
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
      return Err(FormulaError::Empty);
    }
    let mut parser = Parser {
      tokens,
      pos: 0,
      depth: 0,
    };
    let root = parser.expr()?;
    if let Some(extra) = parser.peek() {
      return Err(FormulaError::UnexpectedToken(extra.to_string()));
    }
    Ok(Self { root })
  }

  /// Evaluate with the given variable bindings
  pub fn evaluate(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    let value = eval(&self.root, vars)?;
    if value.is_finite() {
      Ok(value)
    } else {
      Err(FormulaError::NonFinite)
    }
  }
}

/// Parse and evaluate in one step
pub fn evaluate(source: &str, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
  Formula::parse(source)?.evaluate(vars)
}

fn eval(expr: &Expr, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
  match expr {
    Expr::Number(n) => Ok(*n),
    Expr::Var(name) => lookup(name, vars),
    Expr::Neg(inner) => Ok(-eval(inner, vars)?),
    Expr::Binary(op, lhs, rhs) => {
      let a = eval(lhs, vars)?;
      let b = eval(rhs, vars)?;
      match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div if b == 0.0 => Err(FormulaError::DivisionByZero),
        BinaryOp::Div => Ok(a / b),
        BinaryOp::Pow => Ok(a.powf(b)),
      }
    }
    Expr::Call(function, args) => {
      let values = args
        .iter()
        .map(|arg| eval(arg, vars))
        .collect::<Result<Vec<f64>, _>>()?;
      Ok(apply(*function, &values))
    }
  }
}

fn lookup(name: &str, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
  if let Some(value) = vars.get(name) {
    return Ok(*value);
  }
  match name {
    "pi" | "PI" | "M_PI" => Ok(std::f64::consts::PI),
    _ => Err(FormulaError::UnknownVariable(name.to_string())),
  }
}

// Arity is checked at parse time
fn apply(function: Function, args: &[f64]) -> f64 {
  match function {
    Function::Pi => std::f64::consts::PI,
    Function::Sqrt => args[0].sqrt(),
    Function::Abs => args[0].abs(),
    Function::Floor => args[0].floor(),
    Function::Ceil => args[0].ceil(),
    Function::Pow => args[0].powf(args[1]),
    Function::Round => match args.get(1) {
      Some(precision) => {
        let factor = 10f64.powi(*precision as i32);
        (args[0] * factor).round() / factor
      }
      None => args[0].round(),
    },
    Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
    Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
  }

  fn eval_plain(source: &str) -> Result<f64, FormulaError> {
    evaluate(source, &HashMap::new())
  }

  #[test]
  fn test_precedence() {
    assert_eq!(eval_plain("2 + 3 * 4").unwrap(), 14.0);
    assert_eq!(eval_plain("(2 + 3) * 4").unwrap(), 20.0);
    assert_eq!(eval_plain("10 - 4 / 2").unwrap(), 8.0);
    assert_eq!(eval_plain("2 * 3 ^ 2").unwrap(), 18.0);
  }

  #[test]
  fn test_left_associative_subtraction_and_division() {
    assert_eq!(eval_plain("10 - 3 - 2").unwrap(), 5.0);
    assert_eq!(eval_plain("64 / 4 / 2").unwrap(), 8.0);
  }

  #[test]
  fn test_power_is_right_associative() {
    assert_eq!(eval_plain("2 ^ 3 ^ 2").unwrap(), 512.0);
    assert_eq!(eval_plain("2 ** 3 ** 2").unwrap(), 512.0);
    assert_eq!(eval_plain("2 ^ -1").unwrap(), 0.5);
  }

  #[test]
  fn test_unary_signs() {
    assert_eq!(eval_plain("-3 + 5").unwrap(), 2.0);
    assert_eq!(eval_plain("--3").unwrap(), 3.0);
    assert_eq!(eval_plain("+4 * -2").unwrap(), -8.0);
    assert_eq!(eval_plain("-2 ^ 2").unwrap(), -4.0);
  }

  #[test]
  fn test_number_literals() {
    assert_eq!(eval_plain(".5 + 0.25").unwrap(), 0.75);
    assert_eq!(eval_plain("1e3").unwrap(), 1000.0);
    assert_eq!(eval_plain("2.5E-1").unwrap(), 0.25);
    assert!(matches!(eval_plain("1.2.3"), Err(FormulaError::InvalidNumber(_))));
  }

  #[test]
  fn test_variables() {
    let v = vars(&[("length", 100.0), ("width", 20.0), ("height", 5.0)]);
    assert_eq!(evaluate("length * width * height", &v).unwrap(), 10_000.0);
  }

  #[test]
  fn test_cylinder_volume_formula() {
    let v = vars(&[("D", 10.0), ("L", 100.0)]);
    let volume = evaluate("pi * (D / 2) ^ 2 * L", &v).unwrap();
    assert!((volume - std::f64::consts::PI * 25.0 * 100.0).abs() < 1e-9);
    let same = evaluate("M_PI * pow(D / 2, 2) * L", &v).unwrap();
    assert!((volume - same).abs() < 1e-9);
  }

  #[test]
  fn test_functions() {
    assert_eq!(eval_plain("sqrt(16)").unwrap(), 4.0);
    assert_eq!(eval_plain("abs(-2.5)").unwrap(), 2.5);
    assert_eq!(eval_plain("min(3, 1, 2)").unwrap(), 1.0);
    assert_eq!(eval_plain("max(3, 1, 2)").unwrap(), 3.0);
    assert_eq!(eval_plain("round(2.5)").unwrap(), 3.0);
    assert_eq!(eval_plain("round(3.14159, 2)").unwrap(), 3.14);
    assert_eq!(eval_plain("floor(2.7) + ceil(2.1)").unwrap(), 5.0);
    assert!((eval_plain("pi()").unwrap() - std::f64::consts::PI).abs() < 1e-12);
    assert_eq!(eval_plain("SQRT(9)").unwrap(), 3.0);
  }

  #[test]
  fn test_variable_shadows_constant() {
    let v = vars(&[("pi", 3.0)]);
    assert_eq!(evaluate("pi * 2", &v).unwrap(), 6.0);
  }

  #[test]
  fn test_division_by_zero_rejected() {
    assert_eq!(eval_plain("1 / 0"), Err(FormulaError::DivisionByZero));
    let v = vars(&[("w", 0.0)]);
    assert_eq!(evaluate("10 / w", &v), Err(FormulaError::DivisionByZero));
  }

  #[test]
  fn test_unknown_identifiers_rejected() {
    assert_eq!(
      eval_plain("length * 2"),
      Err(FormulaError::UnknownVariable("length".to_string()))
    );
    assert_eq!(
      eval_plain("system(1)"),
      Err(FormulaError::UnknownFunction("system".to_string()))
    );
  }

  #[test]
  fn test_trailing_garbage_rejected() {
    assert!(matches!(eval_plain("1 + 2 3"), Err(FormulaError::UnexpectedToken(_))));
    assert!(matches!(eval_plain("(1 + 2))"), Err(FormulaError::UnexpectedToken(_))));
  }

  #[test]
  fn test_malformed_input_rejected() {
    assert_eq!(eval_plain(""), Err(FormulaError::Empty));
    assert_eq!(eval_plain("   "), Err(FormulaError::Empty));
    assert_eq!(eval_plain("1 +"), Err(FormulaError::UnexpectedEnd));
    assert_eq!(eval_plain("(1 + 2"), Err(FormulaError::UnexpectedEnd));
    assert!(matches!(eval_plain("$a + 1"), Err(FormulaError::UnexpectedChar('$', 0))));
    assert!(matches!(eval_plain("1; 2"), Err(FormulaError::UnexpectedChar(';', 1))));
  }

  #[test]
  fn test_arity_checked_at_parse_time() {
    assert!(matches!(Formula::parse("sqrt(1, 2)"), Err(FormulaError::Arity { .. })));
    assert!(matches!(Formula::parse("pow(2)"), Err(FormulaError::Arity { .. })));
    assert!(matches!(Formula::parse("min()"), Err(FormulaError::Arity { .. })));
  }

  #[test]
  fn test_deep_nesting_rejected() {
    let parens = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
    assert_eq!(Formula::parse(&parens), Err(FormulaError::TooLong(MAX_FORMULA_LEN)));

    let nested = format!("{}1{}", "(".repeat(200), ")".repeat(200));
    assert_eq!(Formula::parse(&nested), Err(FormulaError::TooDeep(MAX_DEPTH)));

    let signs = format!("{}1", "-".repeat(500));
    assert_eq!(Formula::parse(&signs), Err(FormulaError::TooDeep(MAX_DEPTH)));

    let powers = vec!["2"; 200].join("^");
    assert_eq!(Formula::parse(&powers), Err(FormulaError::TooDeep(MAX_DEPTH)));
  }

  #[test]
  fn test_reasonable_nesting_accepted() {
    let nested = format!("{}1{}", "(".repeat(20), ")".repeat(20));
    assert_eq!(eval_plain(&nested).unwrap(), 1.0);
    assert_eq!(eval_plain(&format!("{}3", "-".repeat(10))).unwrap(), 3.0);
    let sum = vec!["1"; 400].join("+");
    assert_eq!(eval_plain(&sum).unwrap(), 400.0);
  }

  #[test]
  fn test_overlong_formula_rejected() {
    let long = vec!["1"; MAX_FORMULA_LEN].join("+");
    assert_eq!(Formula::parse(&long), Err(FormulaError::TooLong(MAX_FORMULA_LEN)));
  }

  #[test]
  fn test_non_finite_result_rejected() {
    assert_eq!(eval_plain("sqrt(-1)"), Err(FormulaError::NonFinite));
  }

  #[test]
  fn test_parse_once_evaluate_many() {
    let formula = Formula::parse("a * a").unwrap();
    assert_eq!(formula.evaluate(&vars(&[("a", 3.0)])).unwrap(), 9.0);
    assert_eq!(formula.evaluate(&vars(&[("a", 4.0)])).unwrap(), 16.0);
  }
}
