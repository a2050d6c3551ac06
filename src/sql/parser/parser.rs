use std::iter::Peekable;

use super::ast::{self, Expression, Literal, Operator};
use super::{Keyword, Lexer, Token};
use crate::errinput;
use crate::error::Result;
use crate::sql::types::DataType;

/// The SQL parser takes tokens from the lexer and parses the SQL syntax into an
/// Abstract Syntax Tree (AST).
///
/// The AST represents the syntactic structure of a SQL query (e.g. the SELECT
/// and FROM clauses, values, arithmetic expressions, etc.). However, it only
/// ensures the syntax is well-formed, and does not know whether e.g. a given
/// table or column exists or which kind of join to use -- that is the job of
/// the planner.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl Parser<'_> {
    /// Parses the input string into an AST statement. The whole string must be
    /// parsed as a single statement, ending with an optional semicolon.
    pub fn parse(statement: &str) -> Result<ast::Statement> {
        let mut parser = Parser::new(statement);
        let statement = parser.parse_statement()?;
        parser.next_is(Token::Semicolon);
        if let Some(token) = parser.lexer.next().transpose()? {
            return errinput!("unexpected token {token}");
        }
        Ok(statement)
    }

    /// Creates a new parser for the given raw SQL string.
    fn new(statement: &str) -> Parser {
        Parser { lexer: Lexer::new(statement).peekable() }
    }

    /// Fetches the next lexer token, or errors if none is found.
    fn next(&mut self) -> Result<Token> {
        self.lexer.next().transpose()?.ok_or_else(|| errinput!("unexpected end of input"))
    }

    /// Returns the next identifier, or errors if not found.
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => errinput!("expected identifier, got {token}"),
        }
    }

    /// Returns the next lexer token if it satisfies the predicate.
    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Passes the next lexer token through the closure, consuming it if the
    /// closure returns Some. Returns the result of the closure.
    fn next_if_map<T>(&mut self, f: impl Fn(&Token) -> Option<T>) -> Option<T> {
        let value = self.peek().unwrap_or(None).map(f)??;
        self.next().ok();
        Some(value)
    }

    /// Returns the next keyword if there is one.
    fn next_if_keyword(&mut self) -> Option<Keyword> {
        self.next_if_map(|token| match token {
            Token::Keyword(keyword) => Some(*keyword),
            _ => None,
        })
    }

    /// Consumes the next lexer token if it is the given token, returning true.
    fn next_is(&mut self, token: Token) -> bool {
        self.next_if(|t| t == &token).is_some()
    }

    /// Consumes the next lexer token if it's the expected token, or errors.
    fn expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return errinput!("expected token {expect}, found {token}");
        }
        Ok(())
    }

    /// Peeks the next lexer token if any, but transposes it for convenience.
    fn peek(&mut self) -> Result<Option<&Token>> {
        self.lexer.peek().map(|r| r.as_ref().map_err(|err| err.clone())).transpose()
    }

    /// Parses a SQL statement.
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        let Some(token) = self.peek()? else {
            return errinput!("unexpected end of input");
        };
        match token {
            Token::Keyword(Keyword::Create) => self.parse_create_table(),
            Token::Keyword(Keyword::Drop) => self.parse_drop_table(),
            Token::Keyword(Keyword::Insert) => self.parse_insert(),
            Token::Keyword(Keyword::Install) => self.parse_install(),
            Token::Keyword(Keyword::Load) => self.parse_load(),
            Token::Keyword(Keyword::Select) => self.parse_select(),
            token => errinput!("unexpected token {token}"),
        }
    }

    /// Parses an extension name, either as an identifier or a string.
    fn parse_extension(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(name) | Token::String(name) => Ok(name),
            token => errinput!("expected extension name, got {token}"),
        }
    }

    /// Parses an INSTALL statement.
    fn parse_install(&mut self) -> Result<ast::Statement> {
        self.expect(Keyword::Install.into())?;
        Ok(ast::Statement::Install { extension: self.parse_extension()? })
    }

    /// Parses a LOAD statement.
    fn parse_load(&mut self) -> Result<ast::Statement> {
        self.expect(Keyword::Load.into())?;
        Ok(ast::Statement::Load { extension: self.parse_extension()? })
    }

    /// Parses a CREATE [OR REPLACE] TABLE statement, either with column
    /// definitions or AS SELECT.
    fn parse_create_table(&mut self) -> Result<ast::Statement> {
        self.expect(Keyword::Create.into())?;
        let or_replace = self.next_is(Keyword::Or.into());
        if or_replace {
            self.expect(Keyword::Replace.into())?;
        }
        self.expect(Keyword::Table.into())?;
        let name = self.next_ident()?;

        if self.next_is(Keyword::As.into()) {
            let query = Box::new(self.parse_select()?);
            return Ok(ast::Statement::CreateTableAs { name, query, or_replace });
        }

        self.expect(Token::OpenParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_create_table_column()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        self.expect(Token::CloseParen)?;
        Ok(ast::Statement::CreateTable { name, columns, or_replace })
    }

    /// Parses a CREATE TABLE column definition.
    fn parse_create_table_column(&mut self) -> Result<ast::Column> {
        let name = self.next_ident()?;
        let datatype = match self.next()? {
            Token::Keyword(Keyword::Bool | Keyword::Boolean) => DataType::Boolean,
            Token::Keyword(Keyword::Bigint | Keyword::Int | Keyword::Integer) => DataType::Integer,
            Token::Keyword(Keyword::Double | Keyword::Float) => DataType::Float,
            Token::Keyword(Keyword::String | Keyword::Text | Keyword::Varchar) => DataType::String,
            token => return errinput!("unexpected token {token}"),
        };
        let mut column = ast::Column { name, datatype, nullable: None };
        while let Some(keyword) = self.next_if_keyword() {
            match keyword {
                Keyword::Null if column.nullable.is_none() => column.nullable = Some(true),
                Keyword::Not if column.nullable.is_none() => {
                    self.expect(Keyword::Null.into())?;
                    column.nullable = Some(false);
                }
                Keyword::Null | Keyword::Not => {
                    return errinput!("nullability already set for column {}", column.name)
                }
                keyword => return errinput!("unexpected keyword {keyword}"),
            }
        }
        Ok(column)
    }

    /// Parses a DROP TABLE statement.
    fn parse_drop_table(&mut self) -> Result<ast::Statement> {
        self.expect(Keyword::Drop.into())?;
        self.expect(Keyword::Table.into())?;
        let mut if_exists = false;
        if self.next_is(Keyword::If.into()) {
            self.expect(Keyword::Exists.into())?;
            if_exists = true;
        }
        let name = self.next_ident()?;
        Ok(ast::Statement::DropTable { name, if_exists })
    }

    /// Parses an INSERT statement.
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.expect(Keyword::Insert.into())?;
        self.expect(Keyword::Into.into())?;
        let table = self.next_ident()?;

        let mut columns = None;
        if self.next_is(Token::OpenParen) {
            let columns = columns.insert(Vec::new());
            loop {
                columns.push(self.next_ident()?);
                if !self.next_is(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
        }

        self.expect(Keyword::Values.into())?;
        let mut values = Vec::new();
        loop {
            let mut row = Vec::new();
            self.expect(Token::OpenParen)?;
            loop {
                row.push(self.parse_expression()?);
                if !self.next_is(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
            values.push(row);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(ast::Statement::Insert { table, columns, values })
    }

    /// Parses a SELECT statement.
    fn parse_select(&mut self) -> Result<ast::Statement> {
        Ok(ast::Statement::Select {
            select: self.parse_select_clause()?,
            from: self.parse_from_clause()?,
            r#where: self.parse_where_clause()?,
            group_by: self.parse_group_by_clause()?,
            having: self.parse_having_clause()?,
            order_by: self.parse_order_by_clause()?,
            limit: self
                .next_is(Keyword::Limit.into())
                .then(|| self.parse_expression())
                .transpose()?,
            offset: self
                .next_is(Keyword::Offset.into())
                .then(|| self.parse_expression())
                .transpose()?,
        })
    }

    /// Parses a SELECT clause.
    fn parse_select_clause(&mut self) -> Result<Vec<(Expression, Option<String>)>> {
        self.expect(Keyword::Select.into())?;
        let mut select = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let mut alias = None;
            if self.next_is(Keyword::As.into()) || matches!(self.peek()?, Some(Token::Ident(_))) {
                if expr == Expression::All {
                    return errinput!("can't alias *");
                }
                alias = Some(self.next_ident()?);
            }
            select.push((expr, alias));
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(select)
    }

    /// Parses a FROM clause, if present. Only a single table or Parquet
    /// source is supported.
    fn parse_from_clause(&mut self) -> Result<Option<ast::From>> {
        if !self.next_is(Keyword::From.into()) {
            return Ok(None);
        }
        let name = self.next_ident()?;
        let parquet = if self.next_is(Token::OpenParen) {
            if name != "read_parquet" {
                return errinput!("unknown table function {name}");
            }
            let path = match self.next()? {
                Token::String(path) => path,
                token => return errinput!("expected file path, got {token}"),
            };
            self.expect(Token::CloseParen)?;
            Some(path)
        } else {
            None
        };
        let mut alias = None;
        if self.next_is(Keyword::As.into()) || matches!(self.peek()?, Some(Token::Ident(_))) {
            alias = Some(self.next_ident()?);
        }
        if self.next_is(Token::Comma) {
            return errinput!("joins are not supported");
        }
        Ok(Some(match parquet {
            Some(path) => ast::From::Parquet { path, alias },
            None => ast::From::Table { name, alias },
        }))
    }

    /// Parses a WHERE clause, if present.
    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if !self.next_is(Keyword::Where.into()) {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Parses a GROUP BY clause, if present.
    fn parse_group_by_clause(&mut self) -> Result<Vec<Expression>> {
        let mut group_by = Vec::new();
        if !self.next_is(Keyword::Group.into()) {
            return Ok(group_by);
        }
        self.expect(Keyword::By.into())?;
        loop {
            group_by.push(self.parse_expression()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(group_by)
    }

    /// Parses a HAVING clause, if present.
    fn parse_having_clause(&mut self) -> Result<Option<Expression>> {
        if !self.next_is(Keyword::Having.into()) {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Parses an ORDER BY clause, if present.
    fn parse_order_by_clause(&mut self) -> Result<Vec<(Expression, ast::Direction)>> {
        let mut order_by = Vec::new();
        if !self.next_is(Keyword::Order.into()) {
            return Ok(order_by);
        }
        self.expect(Keyword::By.into())?;
        loop {
            let expr = self.parse_expression()?;
            let order = self
                .next_if_map(|token| match token {
                    Token::Keyword(Keyword::Asc) => Some(ast::Direction::Ascending),
                    Token::Keyword(Keyword::Desc) => Some(ast::Direction::Descending),
                    _ => None,
                })
                .unwrap_or_default();
            order_by.push((expr, order));
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(order_by)
    }

    /// Parses an expression consisting of at least one atom operated on by any
    /// number of operators, using the precedence climbing algorithm. Operators
    /// bind to their operands when their precedence is at least the current
    /// minimum precedence, and left-associative operators raise the minimum
    /// for their right-hand operand.
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_expression_at(0)
    }

    /// Parses an expression at the given minimum precedence.
    fn parse_expression_at(&mut self, min_precedence: Precedence) -> Result<Expression> {
        // If there is a prefix operator, parse it and its right-hand operand.
        // Otherwise, parse the left-hand atom.
        let mut lhs = if let Some(prefix) = self.parse_prefix_operator_at(min_precedence) {
            let next_precedence = prefix.precedence() + prefix.associativity();
            let rhs = self.parse_expression_at(next_precedence)?;
            prefix.into_expression(rhs)
        } else {
            self.parse_expression_atom()?
        };

        // Apply any postfix operators.
        while let Some(postfix) = self.parse_postfix_operator_at(min_precedence)? {
            lhs = postfix.into_expression(lhs)
        }

        // Apply any binary infix operators, parsing the right-hand operand.
        while let Some(infix) = self.parse_infix_operator_at(min_precedence) {
            let next_precedence = infix.precedence() + infix.associativity();
            let rhs = self.parse_expression_at(next_precedence)?;
            lhs = infix.into_expression(lhs, rhs);
        }

        // Apply any postfix operators after the binary operator. Consider e.g.
        // 1 + NULL IS NULL.
        while let Some(postfix) = self.parse_postfix_operator_at(min_precedence)? {
            lhs = postfix.into_expression(lhs)
        }

        Ok(lhs)
    }

    /// Parses an expression atom. This is either:
    ///
    /// * A literal value.
    /// * A column name.
    /// * A function call.
    /// * A parenthesized expression.
    fn parse_expression_atom(&mut self) -> Result<Expression> {
        Ok(match self.next()? {
            // All columns.
            Token::Asterisk => Expression::All,

            // Literal value.
            Token::Number(n) if n.chars().all(|c| c.is_ascii_digit()) => {
                Literal::Integer(n.parse()?).into()
            }
            Token::Number(n) => Literal::Float(n.parse()?).into(),
            Token::String(s) => Literal::String(s).into(),
            Token::Keyword(Keyword::True) => Literal::Boolean(true).into(),
            Token::Keyword(Keyword::False) => Literal::Boolean(false).into(),
            Token::Keyword(Keyword::Infinity) => Literal::Float(f64::INFINITY).into(),
            Token::Keyword(Keyword::NaN) => Literal::Float(f64::NAN).into(),
            Token::Keyword(Keyword::Null) => Literal::Null.into(),

            // Function call.
            Token::Ident(name) if self.next_is(Token::OpenParen) => {
                let mut args = Vec::new();
                while !self.next_is(Token::CloseParen) {
                    if !args.is_empty() {
                        self.expect(Token::Comma)?;
                    }
                    args.push(self.parse_expression()?);
                }
                Expression::Function(name, args)
            }

            // Column name, either qualified as table.column or unqualified.
            Token::Ident(table) if self.next_is(Token::Period) => {
                Expression::Column(Some(table), self.next_ident()?)
            }
            Token::Ident(column) => Expression::Column(None, column),

            // Parenthesized expression.
            Token::OpenParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::CloseParen)?;
                expr
            }

            token => return errinput!("expected expression atom, found {token}"),
        })
    }

    /// Parses a prefix operator, if there is one and it's precedence is at
    /// least min_precedence.
    fn parse_prefix_operator_at(&mut self, min_precedence: Precedence) -> Option<PrefixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Keyword(Keyword::Not) => PrefixOperator::Not,
                Token::Minus => PrefixOperator::Minus,
                Token::Plus => PrefixOperator::Plus,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }

    /// Parses an infix operator, if there is one and it's precedence is at
    /// least min_precedence.
    fn parse_infix_operator_at(&mut self, min_precedence: Precedence) -> Option<InfixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Asterisk => InfixOperator::Multiply,
                Token::Caret => InfixOperator::Exponentiate,
                Token::Equal => InfixOperator::Equal,
                Token::GreaterThan => InfixOperator::GreaterThan,
                Token::GreaterThanOrEqual => InfixOperator::GreaterThanOrEqual,
                Token::Keyword(Keyword::And) => InfixOperator::And,
                Token::Keyword(Keyword::Or) => InfixOperator::Or,
                Token::LessOrGreaterThan => InfixOperator::NotEqual,
                Token::LessThan => InfixOperator::LessThan,
                Token::LessThanOrEqual => InfixOperator::LessThanOrEqual,
                Token::Minus => InfixOperator::Subtract,
                Token::NotEqual => InfixOperator::NotEqual,
                Token::Percent => InfixOperator::Remainder,
                Token::Plus => InfixOperator::Add,
                Token::Slash => InfixOperator::Divide,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }

    /// Parses a postfix operator, if there is one and it's precedence is at
    /// least min_precedence. IS [NOT] NULL and IS [NOT] NAN are the only
    /// postfix operators.
    fn parse_postfix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<PostfixOperator>> {
        if PostfixOperator::PRECEDENCE < min_precedence {
            return Ok(None);
        }
        if !self.next_is(Keyword::Is.into()) {
            return Ok(None);
        }
        let not = self.next_is(Keyword::Not.into());
        let value = match self.next()? {
            Token::Keyword(Keyword::NaN) => Literal::Float(f64::NAN),
            Token::Keyword(Keyword::Null) => Literal::Null,
            token => return errinput!("unexpected token {token}"),
        };
        Ok(Some(match not {
            true => PostfixOperator::IsNot(value),
            false => PostfixOperator::Is(value),
        }))
    }
}

/// Operator precedence.
type Precedence = u8;

/// Operator associativity.
enum Associativity {
    Left,
    Right,
}

impl std::ops::Add<Associativity> for Precedence {
    type Output = Self;

    fn add(self, rhs: Associativity) -> Self {
        // Left-associative operators have increased precedence, so they bind
        // tighter to their left-hand side.
        self + match rhs {
            Associativity::Left => 1,
            Associativity::Right => 0,
        }
    }
}

/// Prefix operators.
enum PrefixOperator {
    Minus, // -a
    Not,   // NOT a
    Plus,  // +a
}

impl PrefixOperator {
    /// The operator precedence.
    fn precedence(&self) -> Precedence {
        match self {
            Self::Not => 3,
            Self::Minus | Self::Plus => 10,
        }
    }

    /// The operator associativity. Prefix operators are right-associative by
    /// definition.
    fn associativity(&self) -> Associativity {
        Associativity::Right
    }

    /// Builds an AST expression for the operator.
    fn into_expression(self, rhs: Expression) -> Expression {
        let rhs = Box::new(rhs);
        match self {
            Self::Plus => Operator::Identity(rhs).into(),
            Self::Minus => Operator::Negate(rhs).into(),
            Self::Not => Operator::Not(rhs).into(),
        }
    }
}

/// Infix operators.
enum InfixOperator {
    Add,                // a + b
    And,                // a AND b
    Divide,             // a / b
    Equal,              // a = b
    Exponentiate,       // a ^ b
    GreaterThan,        // a > b
    GreaterThanOrEqual, // a >= b
    LessThan,           // a < b
    LessThanOrEqual,    // a <= b
    Multiply,           // a * b
    NotEqual,           // a != b
    Or,                 // a OR b
    Remainder,          // a % b
    Subtract,           // a - b
}

impl InfixOperator {
    /// The operator precedence.
    ///
    /// Mostly follows Postgres, except IS and LIKE having same precedence as
    /// = and !=. This is similar to SQLite and MySQL.
    fn precedence(&self) -> Precedence {
        match self {
            Self::Or => 1,
            Self::And => 2,
            // Self::Not => 3
            Self::Equal | Self::NotEqual => 4, // also Self::Is
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 5,
            Self::Add | Self::Subtract => 6,
            Self::Multiply | Self::Divide | Self::Remainder => 7,
            Self::Exponentiate => 8,
        }
    }

    /// The operator associativity.
    fn associativity(&self) -> Associativity {
        match self {
            Self::Exponentiate => Associativity::Right,
            _ => Associativity::Left,
        }
    }

    /// Builds an AST expression for the infix operator.
    fn into_expression(self, lhs: Expression, rhs: Expression) -> Expression {
        let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
        match self {
            Self::Add => Operator::Add(lhs, rhs).into(),
            Self::And => Operator::And(lhs, rhs).into(),
            Self::Divide => Operator::Divide(lhs, rhs).into(),
            Self::Equal => Operator::Equal(lhs, rhs).into(),
            Self::Exponentiate => Operator::Exponentiate(lhs, rhs).into(),
            Self::GreaterThan => Operator::GreaterThan(lhs, rhs).into(),
            Self::GreaterThanOrEqual => Operator::GreaterThanOrEqual(lhs, rhs).into(),
            Self::LessThan => Operator::LessThan(lhs, rhs).into(),
            Self::LessThanOrEqual => Operator::LessThanOrEqual(lhs, rhs).into(),
            Self::Multiply => Operator::Multiply(lhs, rhs).into(),
            Self::NotEqual => Operator::NotEqual(lhs, rhs).into(),
            Self::Or => Operator::Or(lhs, rhs).into(),
            Self::Remainder => Operator::Remainder(lhs, rhs).into(),
            Self::Subtract => Operator::Subtract(lhs, rhs).into(),
        }
    }
}

/// Postfix operators.
enum PostfixOperator {
    Is(Literal),    // a IS NULL | NAN
    IsNot(Literal), // a IS NOT NULL | NAN
}

impl PostfixOperator {
    // The operator precedence.
    const PRECEDENCE: Precedence = 4;

    /// Builds an AST expression for the operator.
    fn into_expression(self, lhs: Expression) -> Expression {
        let lhs = Box::new(lhs);
        match self {
            Self::Is(v) => Operator::Is(lhs, v).into(),
            Self::IsNot(v) => Operator::Not(Operator::Is(lhs, v).into()).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::Statement;

    fn expr(input: &str) -> Result<Expression> {
        let mut parser = Parser::new(input);
        let expr = parser.parse_expression()?;
        assert!(parser.lexer.next().is_none(), "unparsed input");
        Ok(expr)
    }

    fn column(name: &str) -> Box<Expression> {
        Box::new(Expression::Column(None, name.into()))
    }

    fn integer(i: i64) -> Box<Expression> {
        Box::new(Literal::Integer(i).into())
    }

    #[test]
    fn precedence() -> Result<()> {
        // 1 + 2 * 3 binds the multiplication first.
        assert_eq!(
            expr("1 + 2 * 3")?,
            Operator::Add(integer(1), Operator::Multiply(integer(2), integer(3)).into()).into()
        );
        // Exponentiation is right-associative.
        assert_eq!(
            expr("2 ^ 3 ^ 2")?,
            Operator::Exponentiate(
                integer(2),
                Operator::Exponentiate(integer(3), integer(2)).into()
            )
            .into()
        );
        // Subtraction is left-associative.
        assert_eq!(
            expr("5 - 3 - 1")?,
            Operator::Subtract(Operator::Subtract(integer(5), integer(3)).into(), integer(1)).into()
        );
        Ok(())
    }

    #[test]
    fn boolean_operators() -> Result<()> {
        assert_eq!(
            expr("NOT a AND b OR c")?,
            Operator::Or(
                Operator::And(Operator::Not(column("a")).into(), column("b")).into(),
                column("c")
            )
            .into()
        );
        assert_eq!(
            expr("a IS NOT NULL")?,
            Operator::Not(Operator::Is(column("a"), Literal::Null).into()).into()
        );
        Ok(())
    }

    #[test]
    fn function_calls() -> Result<()> {
        assert_eq!(
            expr("count(*)")?,
            Expression::Function("count".into(), vec![Expression::All])
        );
        assert_eq!(
            expr("round(a, 2)")?,
            Expression::Function(
                "round".into(),
                vec![Expression::Column(None, "a".into()), Literal::Integer(2).into()]
            )
        );
        Ok(())
    }

    #[test]
    fn create_table_as_parquet() -> Result<()> {
        let statement = Parser::parse(
            "CREATE OR REPLACE TABLE lineitem AS \
             SELECT * FROM read_parquet('data/lineitem.parquet');",
        )?;
        let Statement::CreateTableAs { name, query, or_replace } = statement else {
            panic!("unexpected statement");
        };
        assert_eq!(name, "lineitem");
        assert!(or_replace);
        let Statement::Select { from: Some(ast::From::Parquet { path, .. }), .. } = *query else {
            panic!("unexpected query");
        };
        assert_eq!(path, "data/lineitem.parquet");
        Ok(())
    }

    #[test]
    fn create_table_columns() -> Result<()> {
        let statement = Parser::parse("CREATE TABLE t (a int, b INTEGER NOT NULL, c boolean)")?;
        let Statement::CreateTable { columns, or_replace: false, .. } = statement else {
            panic!("unexpected statement");
        };
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1].datatype, DataType::Integer);
        assert_eq!(columns[1].nullable, Some(false));
        Ok(())
    }

    #[test]
    fn select_clauses() -> Result<()> {
        let statement = Parser::parse(
            "SELECT a, sum(b) AS total FROM t WHERE c GROUP BY a HAVING sum(b) > 1 \
             ORDER BY a DESC LIMIT 5 OFFSET 1",
        )?;
        let Statement::Select { select, group_by, order_by, limit, offset, .. } = statement else {
            panic!("unexpected statement");
        };
        assert_eq!(select[1].1.as_deref(), Some("total"));
        assert_eq!(group_by.len(), 1);
        assert_eq!(order_by[0].1, ast::Direction::Descending);
        assert_eq!(limit, Some(Literal::Integer(5).into()));
        assert_eq!(offset, Some(Literal::Integer(1).into()));
        Ok(())
    }

    #[test]
    fn install_and_load() -> Result<()> {
        assert!(matches!(
            Parser::parse("INSTALL plans")?,
            Statement::Install { extension } if extension == "plans"
        ));
        assert!(matches!(
            Parser::parse("LOAD 'plans';")?,
            Statement::Load { extension } if extension == "plans"
        ));
        Ok(())
    }

    #[test]
    fn trailing_tokens_error() {
        assert!(Parser::parse("SELECT 1 2").is_err());
        assert!(Parser::parse("UPDATE t SET a = 1").is_err());
    }
}
