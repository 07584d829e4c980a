//! Lexical analysis: turns the raw source text into a vector of tokens.
//!
//! The scanner walks the input once with a small lookahead window and keeps
//! running line/column counters so every token remembers where it started.
//! Comments and whitespace are dropped here; nothing downstream sees them.

use tracing::debug;

use crate::error::{CompileError, CompileResult, Position};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Exit,
  Let,
  Mut,
  Print,
  If,
  Else,
  While,
  Ident,
  IntLit,
  StrLit,
  /// One of `+ - * /`; the symbol is carried in [`Token::value`].
  Operator,
  OpenParen,
  CloseParen,
  OpenCurly,
  CloseCurly,
  Semicolon,
  Equals,
  /// The `"` delimiters emitted on both sides of a [`TokenKind::StrLit`].
  Quote,
}

impl TokenKind {
  fn keyword(word: &str) -> Option<Self> {
    match word {
      "exit" => Some(Self::Exit),
      "let" => Some(Self::Let),
      "mut" => Some(Self::Mut),
      "print" => Some(Self::Print),
      "if" => Some(Self::If),
      "else" => Some(Self::Else),
      "while" => Some(Self::While),
      _ => None,
    }
  }

  /// Spelling used in diagnostics.
  pub fn describe(self) -> &'static str {
    match self {
      Self::Exit => "exit",
      Self::Let => "let",
      Self::Mut => "mut",
      Self::Print => "print",
      Self::If => "if",
      Self::Else => "else",
      Self::While => "while",
      Self::Ident => "identifier",
      Self::IntLit => "integer literal",
      Self::StrLit => "string literal",
      Self::Operator => "operator",
      Self::OpenParen => "(",
      Self::CloseParen => ")",
      Self::OpenCurly => "{",
      Self::CloseCurly => "}",
      Self::Semicolon => ";",
      Self::Equals => "=",
      Self::Quote => "\"",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<String>,
  pub position: Position,
}

impl Token {
  pub fn new(kind: TokenKind, position: Position) -> Self {
    Self {
      kind,
      value: None,
      position,
    }
  }

  pub fn with_value(kind: TokenKind, position: Position, value: impl Into<String>) -> Self {
    Self {
      kind,
      value: Some(value.into()),
      position,
    }
  }

  /// Literal text of the token, empty for tokens that carry none.
  pub fn text(&self) -> &str {
    self.value.as_deref().unwrap_or("")
  }
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
  match token {
    Some(t) => match (&t.value, t.kind) {
      (Some(text), TokenKind::StrLit) => format!("\"{text}\""),
      (Some(text), _) => text.clone(),
      (None, kind) => kind.describe().to_string(),
    },
    None => "end of input".to_string(),
  }
}

/// Lex the whole input. Stream exhaustion marks end of input; no sentinel
/// token is appended.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let tokens = Scanner::new(input).run()?;
  debug!(tokens = tokens.len(), "tokenized source");
  Ok(tokens)
}

struct Scanner {
  chars: Vec<char>,
  index: usize,
  line: usize,
  column: usize,
}

impl Scanner {
  fn new(input: &str) -> Self {
    Self {
      chars: input.chars().collect(),
      index: 0,
      line: 1,
      column: 1,
    }
  }

  fn peek(&self, ahead: usize) -> Option<char> {
    self.chars.get(self.index + ahead).copied()
  }

  fn consume(&mut self) -> Option<char> {
    let c = self.chars.get(self.index).copied()?;
    self.index += 1;
    if c == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(c)
  }

  fn position(&self) -> Position {
    Position::new(self.line, self.column)
  }

  fn run(mut self) -> CompileResult<Vec<Token>> {
    let mut tokens = Vec::new();

    while let Some(c) = self.peek(0) {
      let start = self.position();

      if c.is_ascii_alphabetic() {
        let word = self.take_while(|c| c.is_ascii_alphanumeric());
        match TokenKind::keyword(&word) {
          Some(kind) => tokens.push(Token::new(kind, start)),
          None => tokens.push(Token::with_value(TokenKind::Ident, start, word)),
        }
        continue;
      }

      if c == '/' && self.peek(1) == Some('/') {
        self.skip_line_comment();
        continue;
      }

      if c == '/' && self.peek(1) == Some('*') {
        self.skip_block_comment();
        continue;
      }

      if c.is_ascii_digit() {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.parse::<u64>().is_err() {
          return Err(CompileError::lex(
            start,
            format!("integer literal {digits} is out of range"),
          ));
        }
        tokens.push(Token::with_value(TokenKind::IntLit, start, digits));
        continue;
      }

      if c == '"' {
        self.consume();
        tokens.push(Token::new(TokenKind::Quote, start));
        let text = self.string_body();
        tokens.push(Token::with_value(TokenKind::StrLit, start, text));
        tokens.push(Token::new(TokenKind::Quote, self.position()));
        continue;
      }

      let kind = match c {
        '(' => Some(TokenKind::OpenParen),
        ')' => Some(TokenKind::CloseParen),
        '{' => Some(TokenKind::OpenCurly),
        '}' => Some(TokenKind::CloseCurly),
        ';' => Some(TokenKind::Semicolon),
        '=' => Some(TokenKind::Equals),
        _ => None,
      };
      if let Some(kind) = kind {
        self.consume();
        tokens.push(Token::new(kind, start));
        continue;
      }

      if matches!(c, '+' | '-' | '*' | '/') {
        self.consume();
        tokens.push(Token::with_value(TokenKind::Operator, start, c));
        continue;
      }

      if c.is_whitespace() {
        self.consume();
        continue;
      }

      return Err(CompileError::lex(
        start,
        format!("unexpected character '{}'", c.escape_debug()),
      ));
    }

    Ok(tokens)
  }

  fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
    let mut buffer = String::new();
    while let Some(c) = self.peek(0)
      && pred(c)
    {
      buffer.push(c);
      self.consume();
    }
    buffer
  }

  fn skip_line_comment(&mut self) {
    while let Some(c) = self.consume() {
      if c == '\n' {
        break;
      }
    }
  }

  /// An unterminated block comment swallows the rest of the input.
  fn skip_block_comment(&mut self) {
    self.consume();
    self.consume();
    while self.peek(0).is_some() {
      if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
        self.consume();
        self.consume();
        return;
      }
      self.consume();
    }
  }

  /// Consume up to and including the closing quote, returning the raw text in
  /// between. A backslash keeps itself and the next character as-is, which is
  /// what lets `\"` sit inside a literal.
  fn string_body(&mut self) -> String {
    let mut buffer = String::new();
    while let Some(c) = self.consume() {
      match c {
        '"' => break,
        '\\' => {
          buffer.push(c);
          if let Some(next) = self.consume() {
            buffer.push(next);
          }
        }
        _ => buffer.push(c),
      }
    }
    buffer
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .expect("source should lex")
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn keywords_and_identifiers() {
    use TokenKind::*;
    assert_eq!(
      kinds("let mut exits = exit print if else while"),
      vec![Let, Mut, Ident, Equals, Exit, Print, If, Else, While]
    );
  }

  #[test]
  fn identifiers_may_contain_digits_after_first_letter() {
    let tokens = tokenize("x1 y22").unwrap();
    assert_eq!(tokens[0].text(), "x1");
    assert_eq!(tokens[1].text(), "y22");
  }

  #[test]
  fn operators_carry_their_symbol() {
    let tokens = tokenize("1+2-3*4/5").unwrap();
    let ops: Vec<&str> = tokens
      .iter()
      .filter(|t| t.kind == TokenKind::Operator)
      .map(Token::text)
      .collect();
    assert_eq!(ops, vec!["+", "-", "*", "/"]);
  }

  #[test]
  fn positions_track_lines_and_columns() {
    let tokens = tokenize("let x = 1;\n  exit(x);").unwrap();
    assert_eq!(tokens[0].position, Position::new(1, 1));
    assert_eq!(tokens[1].position, Position::new(1, 5));
    let exit = tokens.iter().find(|t| t.kind == TokenKind::Exit).unwrap();
    assert_eq!(exit.position, Position::new(2, 3));
  }

  #[test]
  fn string_literal_is_wrapped_in_quote_markers() {
    use TokenKind::*;
    let tokens = tokenize(r#"print("hi there");"#).unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
      kinds,
      vec![Print, OpenParen, Quote, StrLit, Quote, CloseParen, Semicolon]
    );
    assert_eq!(tokens[3].text(), "hi there");
  }

  #[test]
  fn escaped_quote_does_not_terminate_string() {
    let tokens = tokenize(r#""say \"hi\"\n""#).unwrap();
    assert_eq!(tokens[1].text(), r#"say \"hi\"\n"#);
    assert_eq!(tokens.len(), 3);
  }

  #[test]
  fn escaped_backslash_before_quote_terminates_string() {
    let tokens = tokenize(r#""a\\" 1"#).unwrap();
    assert_eq!(tokens[1].text(), r"a\\");
    assert_eq!(tokens[3].kind, TokenKind::IntLit);
  }

  #[test]
  fn comments_produce_no_tokens() {
    use TokenKind::*;
    assert_eq!(
      kinds("exit // trailing\n/* block\n comment */ ( 1 ) ;"),
      vec![Exit, OpenParen, IntLit, CloseParen, Semicolon]
    );
  }

  #[test]
  fn unterminated_block_comment_runs_to_end() {
    assert_eq!(kinds("exit /* never closed ( 1 );"), vec![TokenKind::Exit]);
  }

  #[test]
  fn division_is_not_mistaken_for_comment() {
    let tokens = tokenize("4 / 2").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::Operator);
    assert_eq!(tokens[1].text(), "/");
  }

  #[test]
  fn unknown_character_reports_position() {
    let err = tokenize("let x = 1;\nlet y = $;").unwrap_err();
    assert!(matches!(err, CompileError::Lex { .. }));
    assert_eq!(err.position(), Position::new(2, 9));
  }

  #[test]
  fn oversized_integer_literal_is_rejected() {
    let err = tokenize("exit(99999999999999999999999);").unwrap_err();
    assert_eq!(err.position(), Position::new(1, 6));
  }

  #[test]
  fn empty_source_yields_no_tokens() {
    assert!(tokenize("  \n\t ").unwrap().is_empty());
  }
}
