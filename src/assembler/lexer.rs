use std::fmt;

use crate::error::AsmError;
use crate::isa::IMMEDIATE_MARKER;

/// Tokens of one source line.
///
/// ```norust
/// LP: LDA# $A   ; comment
/// ^^^ ^^^^ ^^
/// ||  |    Hex(10)
/// ||  Word { "LDA", immediate: true }
/// |Colon
/// Word { "LP", immediate: false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word { text: String, immediate: bool },
    Colon,
    /// `$` followed by one or two hex digits
    Hex(u16),
    /// one to three decimal digits
    Decimal(u16),
    Plus,
    Minus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word { text, immediate } => {
                write!(f, "{text}")?;
                if *immediate {
                    write!(f, "{IMMEDIATE_MARKER}")?;
                }
                Ok(())
            }
            Token::Colon => write!(f, ":"),
            Token::Hex(value) => write!(f, "${value:X}"),
            Token::Decimal(value) => write!(f, "{value}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
        }
    }
}

pub struct LineLexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    tokens: Vec<Token>,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            chars: line.chars().peekable(),
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, AsmError> {
        while let Some(token) = self.next_token()? {
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, AsmError> {
        self.skip_whitespace();

        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        match c {
            // Comment runs to the end of the line
            ';' => {
                self.chars.by_ref().for_each(drop);
                Ok(None)
            }
            ':' => {
                self.chars.next();
                Ok(Some(Token::Colon))
            }
            '+' => {
                self.chars.next();
                Ok(Some(Token::Plus))
            }
            '-' => {
                self.chars.next();
                Ok(Some(Token::Minus))
            }
            '$' => self.tokenize_hex().map(Some),
            c if c.is_ascii_digit() => self.tokenize_decimal().map(Some),
            c if c.is_ascii_alphabetic() => Ok(Some(self.tokenize_word())),
            c => Err(AsmError::UnexpectedChar(c)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.chars.next();
        }
        text
    }

    fn tokenize_hex(&mut self) -> Result<Token, AsmError> {
        self.chars.next(); // Skip the $
        let digits = self.take_while(|c| c.is_ascii_alphanumeric());

        if digits.is_empty() || digits.len() > 2 {
            return Err(AsmError::BadArgument(format!("${digits}")));
        }
        u16::from_str_radix(&digits, 16)
            .map(Token::Hex)
            .map_err(|_| AsmError::BadArgument(format!("${digits}")))
    }

    fn tokenize_decimal(&mut self) -> Result<Token, AsmError> {
        let digits = self.take_while(|c| c.is_ascii_alphanumeric());

        if digits.len() > 3 {
            return Err(AsmError::BadArgument(digits));
        }
        digits
            .parse::<u16>()
            .map(Token::Decimal)
            .map_err(|_| AsmError::BadArgument(digits))
    }

    fn tokenize_word(&mut self) -> Token {
        let text = self.take_while(|c| c.is_ascii_alphanumeric());
        let immediate = self.chars.peek() == Some(&IMMEDIATE_MARKER);
        if immediate {
            self.chars.next();
        }
        tracing::trace!(word = %text, immediate, "word token");
        Token::Word { text, immediate }
    }
}
