use std::rc::Rc;

/// Byte range in the expression source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Parsed binding expression (one or more statements)
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
    pub span: Span,
}

impl Program {
    /// A program that is exactly one expression statement
    pub fn as_single_expression(&self) -> Option<&Expression> {
        match self.body.as_slice() {
            [Statement::Expression(expr)] => Some(expr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Declaration {
        kind: DeclarationKind,
        pattern: Pattern,
        init: Option<Expression>,
        span: Span,
    },
    If {
        test: Expression,
        consequent: Vec<Statement>,
        alternate: Option<Vec<Statement>>,
        span: Span,
    },
    Return {
        argument: Option<Expression>,
        span: Span,
    },
    Block {
        body: Vec<Statement>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expression(Expression),
}

/// Array element or call argument, optionally spread
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Item(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    Computed(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue { key: PropertyKey, value: Expression },
    Shorthand(String),
    Method { key: PropertyKey, function: Rc<FunctionExpr> },
    Getter { key: PropertyKey, function: Rc<FunctionExpr> },
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equals,
    NotEquals,
    StrictEquals,
    StrictNotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Or,
    And,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Expression(Expression),
    Block(Vec<Statement>),
}

/// Arrow function or object-literal method
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: Option<String>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    /// Arrow functions capture `this`; methods receive it from the call site
    pub is_arrow: bool,
    pub span: Span,
}

/// Binding pattern used by declarations, parameters and iteration headers
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Identifier(String),
    Array(Vec<Option<Pattern>>),
    Object(Vec<(String, Pattern)>),
}

impl Pattern {
    /// Every identifier bound by this pattern, in source order
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Identifier(name) => out.push(name),
            Pattern::Array(items) => items.iter().flatten().for_each(|p| p.collect_names(out)),
            Pattern::Object(entries) => entries.iter().for_each(|(_, p)| p.collect_names(out)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: Literal,
        span: Span,
    },
    Template {
        parts: Vec<TemplatePart>,
        span: Span,
    },
    Identifier {
        name: String,
        span: Span,
    },
    This {
        span: Span,
    },
    Array {
        elements: Vec<Element>,
        span: Span,
    },
    Object {
        properties: Vec<Property>,
        span: Span,
    },
    Member {
        object: Box<Expression>,
        property: MemberProperty,
        optional: bool,
        span: Span,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Element>,
        optional: bool,
        span: Span,
    },
    Unary {
        operator: UnaryOp,
        argument: Box<Expression>,
        span: Span,
    },
    Update {
        operator: UpdateOp,
        prefix: bool,
        target: Box<Expression>,
        span: Span,
    },
    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
        span: Span,
    },
    Logical {
        left: Box<Expression>,
        operator: LogicalOp,
        right: Box<Expression>,
        span: Span,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
        span: Span,
    },
    Assignment {
        target: Box<Expression>,
        operator: AssignOp,
        value: Box<Expression>,
        span: Span,
    },
    Function(Rc<FunctionExpr>),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::Template { span, .. }
            | Expression::Identifier { span, .. }
            | Expression::This { span }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Member { span, .. }
            | Expression::Call { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Update { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Logical { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Assignment { span, .. } => *span,
            Expression::Function(function) => function.span,
        }
    }

    /// Identifiers and member accesses can be assigned to
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Identifier { .. } | Expression::Member { optional: false, .. }
        )
    }
}

/// Header of an iteration binding: `(item, index) in items`
#[derive(Debug, Clone, PartialEq)]
pub struct IterationHeader {
    pub item: Pattern,
    pub index: Option<Pattern>,
    pub collection: Option<Pattern>,
    pub items: Program,
}
