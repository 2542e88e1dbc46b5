//! Remote search predicates in prefix notation

use serde_json::Value;

/// One element of a domain: an operator or a `(field, operator, value)` leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Or,
    And,
    Not,
    Leaf {
        field: String,
        operator: String,
        value: Value,
    },
}

impl Term {
    pub fn leaf(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Leaf {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Or => Value::from("|"),
            Self::And => Value::from("&"),
            Self::Not => Value::from("!"),
            Self::Leaf {
                field,
                operator,
                value,
            } => Value::Array(vec![
                Value::from(field.as_str()),
                Value::from(operator.as_str()),
                value.clone(),
            ]),
        }
    }
}

/// Search predicate.
///
/// Operators apply to the terms that follow them; consecutive top-level
/// leaves are implicitly and-ed.
///
/// ```
/// use erpsync_core::rpc::Domain;
///
/// let domain = Domain::new()
///     .filter("type", "=", "out_invoice")
///     .or()
///     .filter("import_id", "=", 7)
///     .filter("name", "=", "F001-7");
/// assert_eq!(domain.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    terms: Vec<Term>,
}

impl Domain {
    pub const fn new() -> Self {
        Self { terms: Vec::new() }
    }

    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.terms.push(Term::leaf(field, operator, value));
        self
    }

    #[must_use]
    pub fn or(mut self) -> Self {
        self.terms.push(Term::Or);
        self
    }

    #[must_use]
    pub fn and(mut self) -> Self {
        self.terms.push(Term::And);
        self
    }

    #[must_use]
    pub fn not(mut self) -> Self {
        self.terms.push(Term::Not);
        self
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Wire form: a JSON array of operators and `[field, op, value]` triples
    pub fn to_value(&self) -> Value {
        Value::Array(self.terms.iter().map(Term::to_value).collect())
    }
}
