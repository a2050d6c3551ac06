use crate::sql::types::DataType;

/// A parsed SQL statement. Names are not resolved yet; the planner checks them
/// against the catalog.
#[derive(Debug)]
pub enum Statement {
    /// Install an extension.
    Install { extension: String },
    /// Load an installed extension into the session.
    Load { extension: String },
    /// Create a new table from column definitions.
    CreateTable { name: String, columns: Vec<Column>, or_replace: bool },
    /// Create a new table from a query result.
    CreateTableAs { name: String, query: Box<Statement>, or_replace: bool },
    /// DROP TABLE.
    DropTable { name: String, if_exists: bool },
    /// INSERT INTO ... VALUES.
    Insert {
        table: String,
        columns: Option<Vec<String>>, // columns given in values, NULL for the rest
        values: Vec<Vec<Expression>>, // rows to insert
    },
    /// A SELECT query.
    Select {
        select: Vec<(Expression, Option<String>)>,
        from: Option<From>,
        r#where: Option<Expression>,
        group_by: Vec<Expression>,
        having: Option<Expression>,
        order_by: Vec<(Expression, Direction)>,
        offset: Option<Expression>,
        limit: Option<Expression>,
    },
}

/// A FROM item.
#[derive(Debug)]
pub enum From {
    /// A catalog table.
    Table { name: String, alias: Option<String> },
    /// A Parquet file read directly via read_parquet('path').
    Parquet { path: String, alias: Option<String> },
}

/// A CREATE TABLE column definition.
#[derive(Debug)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: Option<bool>,
}

/// ORDER BY direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// A SQL expression tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    /// The * wildcard.
    All,
    /// A column name, with an optional table qualifier.
    Column(Option<String>, String),
    Literal(Literal),
    /// A function call by name.
    Function(String, Vec<Expression>),
    Operator(Operator),
}

/// A literal constant.
#[derive(Clone, Debug)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// To allow using expressions and literals in e.g. hashmaps, implement simple
/// equality by value for all types, including Null and f64::NAN. This only
/// checks that the values are the same, and ignores SQL semantics for e.g.
/// NULL and NaN (which is handled by SQL expression evaluation).
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Integer(l), Self::Integer(r)) => l == r,
            // Bitwise, so NaN equals itself and -0.0 differs from 0.0.
            (Self::Float(l), Self::Float(r)) => l.to_bits() == r.to_bits(),
            (Self::String(l), Self::String(r)) => l == r,
            (l, r) => std::mem::discriminant(l) == std::mem::discriminant(r),
        }
    }
}

impl Eq for Literal {}

impl std::hash::Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(v) => v.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::String(v) => v.hash(state),
        }
    }
}

/// Unary and binary operators, with boxed operands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    And(Box<Expression>, Box<Expression>), // a AND b
    Not(Box<Expression>),                  // NOT a
    Or(Box<Expression>, Box<Expression>),  // a OR b

    Equal(Box<Expression>, Box<Expression>),       // a = b
    GreaterThan(Box<Expression>, Box<Expression>), // a > b
    GreaterThanOrEqual(Box<Expression>, Box<Expression>), // a >= b
    Is(Box<Expression>, Literal),                  // IS NULL or IS NAN
    LessThan(Box<Expression>, Box<Expression>),    // a < b
    LessThanOrEqual(Box<Expression>, Box<Expression>), // a <= b
    NotEqual(Box<Expression>, Box<Expression>),    // a != b

    Add(Box<Expression>, Box<Expression>),          // a + b
    Divide(Box<Expression>, Box<Expression>),       // a / b
    Exponentiate(Box<Expression>, Box<Expression>), // a ^ b
    Identity(Box<Expression>),                      // +a
    Multiply(Box<Expression>, Box<Expression>),     // a * b
    Negate(Box<Expression>),                        // -a
    Remainder(Box<Expression>, Box<Expression>),    // a % b
    Subtract(Box<Expression>, Box<Expression>),     // a - b
}

impl std::convert::From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl std::convert::From<Operator> for Expression {
    fn from(operator: Operator) -> Self {
        Self::Operator(operator)
    }
}

impl std::convert::From<Operator> for Box<Expression> {
    fn from(operator: Operator) -> Self {
        Box::new(operator.into())
    }
}

impl Expression {
    /// Visits every node depth-first, parents before children. Stops early and
    /// returns false as soon as the visitor does.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression) -> bool) -> bool {
        use Operator::*;
        if !visitor(self) {
            return false;
        }
        match self {
            Self::All | Self::Column(_, _) | Self::Literal(_) => true,

            Self::Function(_, args) => args.iter().all(|arg| arg.walk(visitor)),

            Self::Operator(Add(lhs, rhs))
            | Self::Operator(And(lhs, rhs))
            | Self::Operator(Divide(lhs, rhs))
            | Self::Operator(Equal(lhs, rhs))
            | Self::Operator(Exponentiate(lhs, rhs))
            | Self::Operator(GreaterThan(lhs, rhs))
            | Self::Operator(GreaterThanOrEqual(lhs, rhs))
            | Self::Operator(LessThan(lhs, rhs))
            | Self::Operator(LessThanOrEqual(lhs, rhs))
            | Self::Operator(Multiply(lhs, rhs))
            | Self::Operator(NotEqual(lhs, rhs))
            | Self::Operator(Or(lhs, rhs))
            | Self::Operator(Remainder(lhs, rhs))
            | Self::Operator(Subtract(lhs, rhs)) => lhs.walk(visitor) && rhs.walk(visitor),

            Self::Operator(Identity(expr))
            | Self::Operator(Is(expr, _))
            | Self::Operator(Negate(expr))
            | Self::Operator(Not(expr)) => expr.walk(visitor),
        }
    }

    /// Returns true if the predicate holds for any node.
    pub fn contains(&self, visitor: &impl Fn(&Expression) -> bool) -> bool {
        !self.walk(&mut |expr| !visitor(expr))
    }

    /// Finds and collects expressions for which the given closure returns
    /// true, adding them to c. Does not recurse into matching expressions.
    pub fn collect(&self, visitor: &impl Fn(&Expression) -> bool, c: &mut Vec<Expression>) {
        use Operator::*;
        if visitor(self) {
            c.push(self.clone());
            return;
        }
        match self {
            Self::All | Self::Column(_, _) | Self::Literal(_) => {}

            Self::Function(_, args) => args.iter().for_each(|arg| arg.collect(visitor, c)),

            Self::Operator(Add(lhs, rhs))
            | Self::Operator(And(lhs, rhs))
            | Self::Operator(Divide(lhs, rhs))
            | Self::Operator(Equal(lhs, rhs))
            | Self::Operator(Exponentiate(lhs, rhs))
            | Self::Operator(GreaterThan(lhs, rhs))
            | Self::Operator(GreaterThanOrEqual(lhs, rhs))
            | Self::Operator(LessThan(lhs, rhs))
            | Self::Operator(LessThanOrEqual(lhs, rhs))
            | Self::Operator(Multiply(lhs, rhs))
            | Self::Operator(NotEqual(lhs, rhs))
            | Self::Operator(Or(lhs, rhs))
            | Self::Operator(Remainder(lhs, rhs))
            | Self::Operator(Subtract(lhs, rhs)) => {
                lhs.collect(visitor, c);
                rhs.collect(visitor, c);
            }

            Self::Operator(Identity(expr))
            | Self::Operator(Is(expr, _))
            | Self::Operator(Negate(expr))
            | Self::Operator(Not(expr)) => expr.collect(visitor, c),
        }
    }
}
