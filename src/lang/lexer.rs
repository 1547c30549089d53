use crate::lang::{
    span::Span,
    token::{Comment, Token, TokenKind},
};

#[derive(Clone, Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub errors: Vec<LexError>,
}

pub fn lex(source: &str) -> Lexed {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    out: Lexed,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            out: Lexed::default(),
        }
    }

    fn run(mut self) -> Lexed {
        while let Some(ch) = self.current {
            match ch {
                '\n' => {
                    self.maybe_insert_semi();
                    self.bump();
                }
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '"' => self.lex_string(),
                '`' => self.lex_raw_string(),
                '\'' => self.lex_char(),
                _ => self.lex_symbol(),
            }
        }
        self.maybe_insert_semi();
        self.push_token(TokenKind::Eof, self.offset, self.offset);
        self.out
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.out.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.out.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    // Automatic semicolon insertion at line ends, following the Go rule.
    fn maybe_insert_semi(&mut self) {
        if let Some(last) = self.out.tokens.last() {
            if last.kind.ends_statement() {
                let at = self.offset;
                self.push_token(TokenKind::Semi, at, at);
            }
        }
    }

    fn eat_line_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        let text_start = self.offset;
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
        self.out.comments.push(Comment {
            text: self.src[text_start..self.offset].to_string(),
            span: Span::new(start, self.offset),
        });
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        let text_start = self.offset;
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                let text_end = self.offset;
                self.bump();
                self.bump();
                self.out.comments.push(Comment {
                    text: self.src[text_start..text_end].to_string(),
                    span: Span::new(start, self.offset),
                });
                return;
            }
            self.bump();
        }
        self.error(start, self.offset, "unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.offset];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        self.push_token(kind, start, self.offset);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let mut is_float = false;
        // Hex, octal, binary prefixes.
        if self.current == Some('0') && matches!(self.peek(), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            self.bump();
            while let Some(ch) = self.current {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
            let text = self.src[start..self.offset].to_string();
            self.push_token(TokenKind::Int(text), start, self.offset);
            return;
        }
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if self.current == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() || ch == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.current, Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.current, Some('+' | '-')) {
                self.bump();
            }
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        let text = self.src[start..self.offset].to_string();
        let kind = if is_float {
            TokenKind::Float(text)
        } else {
            TokenKind::Int(text)
        };
        self.push_token(kind, start, self.offset);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        loop {
            match self.current {
                None | Some('\n') => {
                    self.error(start, self.offset, "unterminated string literal");
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(esc) = self.current {
                        value.push(unescape(esc));
                        self.bump();
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push_token(TokenKind::Str(value), start, self.offset);
    }

    fn lex_raw_string(&mut self) {
        let start = self.offset;
        self.bump();
        let text_start = self.offset;
        loop {
            match self.current {
                None => {
                    self.error(start, self.offset, "unterminated raw string literal");
                    let value = self.src[text_start..self.offset].to_string();
                    self.push_token(TokenKind::Str(value), start, self.offset);
                    return;
                }
                Some('`') => {
                    let value = self.src[text_start..self.offset].to_string();
                    self.bump();
                    self.push_token(TokenKind::Str(value), start, self.offset);
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn lex_char(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        loop {
            match self.current {
                None | Some('\n') => {
                    self.error(start, self.offset, "unterminated rune literal");
                    break;
                }
                Some('\'') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(esc) = self.current {
                        value.push(unescape(esc));
                        self.bump();
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push_token(TokenKind::Char(value), start, self.offset);
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let ch = self.current.unwrap_or('\0');
        self.bump();
        let kind = match ch {
            '+' => match self.current {
                Some('+') => self.take(TokenKind::Inc),
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Plus))),
                _ => TokenKind::Plus,
            },
            '-' => match self.current {
                Some('-') => self.take(TokenKind::Dec),
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Minus))),
                _ => TokenKind::Minus,
            },
            '*' => match self.current {
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Star))),
                _ => TokenKind::Star,
            },
            '/' => match self.current {
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Slash))),
                _ => TokenKind::Slash,
            },
            '%' => match self.current {
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Percent))),
                _ => TokenKind::Percent,
            },
            '&' => match self.current {
                Some('&') => self.take(TokenKind::AndAnd),
                Some('^') => {
                    self.bump();
                    match self.current {
                        Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::AndNot))),
                        _ => TokenKind::AndNot,
                    }
                }
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Amp))),
                _ => TokenKind::Amp,
            },
            '|' => match self.current {
                Some('|') => self.take(TokenKind::OrOr),
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Pipe))),
                _ => TokenKind::Pipe,
            },
            '^' => match self.current {
                Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Caret))),
                _ => TokenKind::Caret,
            },
            '<' => match self.current {
                Some('-') => self.take(TokenKind::Arrow),
                Some('=') => self.take(TokenKind::LtEq),
                Some('<') => {
                    self.bump();
                    match self.current {
                        Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Shl))),
                        _ => TokenKind::Shl,
                    }
                }
                _ => TokenKind::Lt,
            },
            '>' => match self.current {
                Some('=') => self.take(TokenKind::GtEq),
                Some('>') => {
                    self.bump();
                    match self.current {
                        Some('=') => self.take(TokenKind::OpAssign(Box::new(TokenKind::Shr))),
                        _ => TokenKind::Shr,
                    }
                }
                _ => TokenKind::Gt,
            },
            '=' => match self.current {
                Some('=') => self.take(TokenKind::EqEq),
                _ => TokenKind::Assign,
            },
            '!' => match self.current {
                Some('=') => self.take(TokenKind::NotEq),
                _ => TokenKind::Not,
            },
            ':' => match self.current {
                Some('=') => self.take(TokenKind::Define),
                _ => TokenKind::Colon,
            },
            '.' => {
                if self.current == Some('.') && self.peek() == Some('.') {
                    self.bump();
                    self.take(TokenKind::Ellipsis)
                } else {
                    TokenKind::Dot
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            _ => {
                self.error(start, self.offset, format!("unexpected character `{ch}`"));
                return;
            }
        };
        self.push_token(kind, start, self.offset);
    }

    fn take(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }
}

fn unescape(esc: char) -> char {
    match esc {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_package_clause() {
        assert_eq!(
            kinds("package demo\n"),
            vec![
                TokenKind::Package,
                TokenKind::Ident("demo".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn inserts_semicolons_after_statement_enders() {
        let toks = kinds("x++\ny\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Inc,
                TokenKind::Semi,
                TokenKind::Ident("y".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operators() {
        let toks = kinds("a +\nb\n");
        assert!(!toks[..3].contains(&TokenKind::Semi));
    }

    #[test]
    fn string_escapes_and_raw_strings() {
        assert_eq!(
            kinds(r#""a\nb""#)[0],
            TokenKind::Str("a\nb".into())
        );
        assert_eq!(kinds("`a\\nb`")[0], TokenKind::Str("a\\nb".into()));
    }

    #[test]
    fn comments_are_carried_out_of_band() {
        let lexed = lex("// Foo does things.\nfunc Foo() {}\n");
        assert_eq!(lexed.comments.len(), 1);
        assert_eq!(lexed.comments[0].text, " Foo does things.");
        assert!(matches!(lexed.tokens[0].kind, TokenKind::Func));
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("a &^= b")[1],
            TokenKind::OpAssign(Box::new(TokenKind::AndNot))
        );
        assert_eq!(kinds("ch <- 1")[1], TokenKind::Arrow);
        assert_eq!(kinds("a...")[1], TokenKind::Ellipsis);
    }
}
