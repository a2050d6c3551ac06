use std::iter::Peekable;
use std::str::Chars;

use crate::errinput;
use crate::error::Result;

/// Splits a SQL string into tokens for the parser. Whitespace and line
/// comments are dropped, unquoted names are lowercased, and quotes are
/// removed from strings and identifiers.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

/// A lexical token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// An unsigned number as written. A leading - is a separate Minus token.
    Number(String),
    /// A string literal, unquoted and unescaped.
    String(String),
    /// An identifier, unquoted.
    Ident(String),
    /// A SQL keyword.
    Keyword(Keyword),
    Period,             // .
    Equal,              // =
    NotEqual,           // !=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    LessThan,           // <
    LessThanOrEqual,    // <=
    LessOrGreaterThan,  // <>
    Plus,               // +
    Minus,              // -
    Asterisk,           // *
    Slash,              // /
    Caret,              // ^
    Percent,            // %
    Exclamation,        // !
    Comma,              // ,
    Semicolon,          // ;
    OpenParen,          // (
    CloseParen,         // )
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Number(n) => n,
            Self::String(s) => s,
            Self::Ident(s) => s,
            Self::Keyword(k) => return k.fmt(f),
            Self::Period => ".",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::LessOrGreaterThan => "<>",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Asterisk => "*",
            Self::Slash => "/",
            Self::Caret => "^",
            Self::Percent => "%",
            Self::Exclamation => "!",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::OpenParen => "(",
            Self::CloseParen => ")",
        })
    }
}

impl From<Keyword> for Token {
    fn from(keyword: Keyword) -> Self {
        Self::Keyword(keyword)
    }
}

/// Keywords. These can't be used as unquoted identifiers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Keyword {
    And,
    As,
    Asc,
    Bigint,
    Bool,
    Boolean,
    By,
    Create,
    Desc,
    Double,
    Drop,
    Exists,
    False,
    Float,
    From,
    Group,
    Having,
    If,
    Infinity,
    Insert,
    Install,
    Int,
    Integer,
    Into,
    Is,
    Limit,
    Load,
    NaN,
    Not,
    Null,
    Offset,
    Or,
    Order,
    Replace,
    Select,
    String,
    Table,
    Text,
    True,
    Values,
    Varchar,
    Where,
}

impl TryFrom<&str> for Keyword {
    type Error = &'static str;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        // The lexer lowercases identifiers before the lookup.
        debug_assert!(value.chars().all(|c| !c.is_uppercase()), "keyword must be lowercase");
        Ok(match value {
            "and" => Self::And,
            "as" => Self::As,
            "asc" => Self::Asc,
            "bigint" => Self::Bigint,
            "bool" => Self::Bool,
            "boolean" => Self::Boolean,
            "by" => Self::By,
            "create" => Self::Create,
            "desc" => Self::Desc,
            "double" => Self::Double,
            "drop" => Self::Drop,
            "exists" => Self::Exists,
            "false" => Self::False,
            "float" => Self::Float,
            "from" => Self::From,
            "group" => Self::Group,
            "having" => Self::Having,
            "if" => Self::If,
            "infinity" => Self::Infinity,
            "insert" => Self::Insert,
            "install" => Self::Install,
            "int" => Self::Int,
            "integer" => Self::Integer,
            "into" => Self::Into,
            "is" => Self::Is,
            "limit" => Self::Limit,
            "load" => Self::Load,
            "nan" => Self::NaN,
            "not" => Self::Not,
            "null" => Self::Null,
            "offset" => Self::Offset,
            "or" => Self::Or,
            "order" => Self::Order,
            "replace" => Self::Replace,
            "select" => Self::Select,
            "string" => Self::String,
            "table" => Self::Table,
            "text" => Self::Text,
            "true" => Self::True,
            "values" => Self::Values,
            "varchar" => Self::Varchar,
            "where" => Self::Where,
            _ => return Err("not a keyword"),
        })
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::As => "AS",
            Self::Asc => "ASC",
            Self::Bigint => "BIGINT",
            Self::Bool => "BOOL",
            Self::Boolean => "BOOLEAN",
            Self::By => "BY",
            Self::Create => "CREATE",
            Self::Desc => "DESC",
            Self::Double => "DOUBLE",
            Self::Drop => "DROP",
            Self::Exists => "EXISTS",
            Self::False => "FALSE",
            Self::Float => "FLOAT",
            Self::From => "FROM",
            Self::Group => "GROUP",
            Self::Having => "HAVING",
            Self::If => "IF",
            Self::Infinity => "INFINITY",
            Self::Insert => "INSERT",
            Self::Install => "INSTALL",
            Self::Int => "INT",
            Self::Integer => "INTEGER",
            Self::Into => "INTO",
            Self::Is => "IS",
            Self::Limit => "LIMIT",
            Self::Load => "LOAD",
            Self::NaN => "NAN",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Offset => "OFFSET",
            Self::Or => "OR",
            Self::Order => "ORDER",
            Self::Replace => "REPLACE",
            Self::Select => "SELECT",
            Self::String => "STRING",
            Self::Table => "TABLE",
            Self::Text => "TEXT",
            Self::True => "TRUE",
            Self::Values => "VALUES",
            Self::Varchar => "VARCHAR",
            Self::Where => "WHERE",
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Result<Token>> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            // Leftover input is an unknown character.
            Ok(None) => self.chars.peek().map(|c| errinput!("unexpected character {c}")),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over the input.
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer { chars: input.chars().peekable() }
    }

    /// Consumes and returns the next character if it matches the predicate.
    fn next_if(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        self.chars.peek().filter(|&&c| predicate(c))?;
        self.chars.next()
    }

    /// Maps the next character, consuming it only if the map returns Some.
    fn next_if_map<T>(&mut self, map: impl Fn(char) -> Option<T>) -> Option<T> {
        let value = self.chars.peek().and_then(|&c| map(c))?;
        self.chars.next();
        Some(value)
    }

    /// Consumes the next character if it is c.
    fn next_is(&mut self, c: char) -> bool {
        self.next_if(|n| n == c).is_some()
    }

    /// Scans the next token. Returns None at the end of input, or at an
    /// unknown character.
    fn scan(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        match self.chars.peek() {
            Some('\'') => Ok(Some(Token::String(self.scan_quoted('\'', "string literal")?))),
            Some('"') => Ok(Some(Token::Ident(self.scan_quoted('"', "quoted identifier")?))),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident_or_keyword()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans an unquoted identifier or keyword, lowercased. Digits are
    /// allowed after the first character.
    fn scan_ident_or_keyword(&mut self) -> Option<Token> {
        let mut name = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_lowercase().to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            name.extend(c.to_lowercase())
        }
        Some(match Keyword::try_from(name.as_str()) {
            Ok(keyword) => Token::Keyword(keyword),
            Err(_) => Token::Ident(name),
        })
    }

    /// Scans a quoted string or identifier, returning its contents. A doubled
    /// quote escapes the quote character, and case is preserved.
    fn scan_quoted(&mut self, quote: char, what: &str) -> Result<String> {
        self.chars.next();
        let mut contents = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote && self.next_is(quote) => contents.push(quote),
                Some(c) if c == quote => return Ok(contents),
                Some(c) => contents.push(c),
                None => return errinput!("unexpected end of {what}"),
            }
        }
    }

    /// Scans a number: digits, then an optional fraction and exponent.
    fn scan_number(&mut self) -> Option<Token> {
        let mut number = self.next_if(|c| c.is_ascii_digit())?.to_string();
        while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
            number.push(c)
        }
        if self.next_is('.') {
            number.push('.');
            while let Some(dec) = self.next_if(|c| c.is_ascii_digit()) {
                number.push(dec)
            }
        }
        if let Some(exp) = self.next_if(|c| c == 'e' || c == 'E') {
            number.push(exp);
            if let Some(sign) = self.next_if(|c| c == '+' || c == '-') {
                number.push(sign)
            }
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                number.push(c)
            }
        }
        Some(Token::Number(number))
    }

    /// Scans a one- or two-character operator or punctuation symbol.
    fn scan_symbol(&mut self) -> Option<Token> {
        let mut token = self.next_if_map(|c| {
            Some(match c {
                '.' => Token::Period,
                '=' => Token::Equal,
                '>' => Token::GreaterThan,
                '<' => Token::LessThan,
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Asterisk,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '%' => Token::Percent,
                '!' => Token::Exclamation,
                ',' => Token::Comma,
                ';' => Token::Semicolon,
                '(' => Token::OpenParen,
                ')' => Token::CloseParen,
                _ => return None,
            })
        })?;
        token = match token {
            Token::Exclamation if self.next_is('=') => Token::NotEqual,
            Token::GreaterThan if self.next_is('=') => Token::GreaterThanOrEqual,
            Token::LessThan if self.next_is('>') => Token::LessOrGreaterThan,
            Token::LessThan if self.next_is('=') => Token::LessThanOrEqual,
            token => token,
        };
        Some(token)
    }

    /// Skips whitespace and -- comments up to the end of the line.
    fn skip_whitespace(&mut self) {
        loop {
            while self.next_if(|c| c.is_whitespace()).is_some() {}
            let mut lookahead = self.chars.clone();
            if lookahead.next() == Some('-') && lookahead.next() == Some('-') {
                while self.next_if(|c| c != '\n').is_some() {}
                continue;
            }
            break;
        }
    }
}
