use serde_json::{Map, Value};

/// Range operator allowed on the last field of a sort-key filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOperator {
    BeginsWith,
    Gte,
    Lte,
    Gt,
    Lt,
}

/// The value a sort-key filter supplies for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOperand {
    /// Exact value.
    Value(Value),
    /// Range operator applied to this field.
    Operator(KeyOperator, Value),
}

/// Restriction on the sort key of a query.
///
/// ```
/// use singletable_core::condition::SortKeyFilter;
///
/// let recent = SortKeyFilter::default()
///     .eq("status", "active")
///     .gte("updatedAt", 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortKeyFilter {
    /// No sort-key restriction.
    #[default]
    Unbounded,
    /// Ordered field values, optionally ending in a range operator.
    Fields(Vec<(String, KeyOperand)>),
    /// Inclusive range between two partial field sets.
    Between(Map<String, Value>, Map<String, Value>),
}

impl SortKeyFilter {
    /// Exact match over the given fields.
    pub fn exact(values: Map<String, Value>) -> Self {
        SortKeyFilter::Fields(
            values
                .into_iter()
                .map(|(field, value)| (field, KeyOperand::Value(value)))
                .collect(),
        )
    }

    /// Inclusive range between two partial keys.
    pub fn between(lower: Map<String, Value>, upper: Map<String, Value>) -> Self {
        SortKeyFilter::Between(lower, upper)
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field.into(), KeyOperand::Value(value.into()))
    }

    pub fn begins_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operator(field, KeyOperator::BeginsWith, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operator(field, KeyOperator::Gte, value)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operator(field, KeyOperator::Lte, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operator(field, KeyOperator::Gt, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operator(field, KeyOperator::Lt, value)
    }

    fn operator(self, field: impl Into<String>, op: KeyOperator, value: impl Into<Value>) -> Self {
        self.push(field.into(), KeyOperand::Operator(op, value.into()))
    }

    // A between filter is replaced, not extended.
    fn push(self, field: String, operand: KeyOperand) -> Self {
        match self {
            SortKeyFilter::Fields(mut fields) => {
                fields.push((field, operand));
                SortKeyFilter::Fields(fields)
            }
            _ => SortKeyFilter::Fields(vec![(field, operand)]),
        }
    }
}

/// Comparison used by a post-filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    BeginsWith,
}

impl FilterOperator {
    /// Infix symbol, for the operators that have one.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            FilterOperator::Eq => Some("="),
            FilterOperator::Ne => Some("<>"),
            FilterOperator::Gt => Some(">"),
            FilterOperator::Gte => Some(">="),
            FilterOperator::Lt => Some("<"),
            FilterOperator::Lte => Some("<="),
            FilterOperator::BeginsWith => None,
        }
    }
}

/// Right-hand side of a post-filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    Compare(FilterOperator, Value),
    Between(Value, Value),
}

/// One `field <op> value` clause of a post-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub operand: FilterOperand,
}

/// Post-filter applied by the engine after the key condition.
///
/// Clauses combine with AND and may name any attribute, keyed or not.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality over every field of `values`.
    pub fn matching(values: Map<String, Value>) -> Self {
        values
            .into_iter()
            .fold(Self::new(), |filter, (field, value)| filter.eq(field, value))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Ne, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Gt, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Gte, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Lt, value)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::Lte, value)
    }

    pub fn begins_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, FilterOperator::BeginsWith, value)
    }

    pub fn between(
        mut self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.clauses.push(FilterClause {
            field: field.into(),
            operand: FilterOperand::Between(low.into(), high.into()),
        });
        self
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn compare(
        mut self,
        field: impl Into<String>,
        op: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.clauses.push(FilterClause {
            field: field.into(),
            operand: FilterOperand::Compare(op, value.into()),
        });
        self
    }
}
