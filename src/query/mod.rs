//! Criteria query engine.
//!
//! A [`Criteria`] names fields by their public name and attaches operator /
//! value pairs to them. [`Criteria::build`] checks everything against the
//! field table of a [`Target`] and produces a [`Spec`], which then drives
//! [`Spec::find`], [`Spec::page`] and [`Spec::count`] alike.
//!
//! All conditions must hold. Fields reached through a to-many relation match
//! a row once per related value that satisfies the condition; a row with no
//! related value never matches. Without `distinct` a row is returned once per
//! combination of matching related values, with `distinct` exactly once.

mod fields;
mod value;

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

pub use fields::{DependencyRow, Dependencies, Libraries, Licenses, Projects};
pub use value::{Kind, Scalar};

use crate::store::Graph;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown {entity} field '{field}'")]
    UnknownField { entity: &'static str, field: String },

    #[error("operator '{operator}' is not supported for field '{field}'")]
    UnsupportedOperator { field: String, operator: Operator },

    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("query syntax error: {0}")]
    Syntax(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Specified,
    In,
    NotIn,
    Contains,
    DoesNotContain,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Between,
}

impl Operator {
    fn name(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Specified => "specified",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Between => "between",
        }
    }

    const ALL: [Operator; 12] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Specified,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThanOrEqual,
        Operator::Between,
    ];
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Syntax(format!("unknown operator '{s}'")))
    }
}

/// How many values a field yields for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value.
    Single,
    /// One value per related row of a to-many join.
    Many,
    /// Several columns of the same row; the row matches once if any does.
    AnyOf,
}

/// Entry of a target's field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<F> {
    pub field: F,
    pub kind: Kind,
    pub cardinality: Cardinality,
}

/// Row type a [`Criteria`] can be compiled against.
pub trait Target {
    const ENTITY: &'static str;
    type Field: Copy + std::fmt::Debug;
    type Item: Clone;

    fn field(name: &str) -> Option<FieldSpec<Self::Field>>;

    /// All rows in canonical order.
    fn rows(graph: &Graph) -> Vec<Self::Item>;

    /// Values of `field` for `row`; empty when there are none.
    fn values(graph: &Graph, row: &Self::Item, field: Self::Field) -> Vec<Scalar>;
}

/// Field name, operator, raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub conditions: Vec<Condition>,
    pub distinct: bool,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, operator: Operator, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Parse `field.operator=value` strings; `distinct=true|false` sets the flag.
    ///
    /// List operators (`in`, `notIn`) and `between` take comma separated values.
    pub fn parse<S: AsRef<str>>(params: &[S]) -> Result<Self, Error> {
        const RE: &str = r"^(?<field>[[:alpha:]][[:word:]]*)\.(?<op>[[:alpha:]]+)=(?<value>.*)$";
        static LOCK: OnceLock<Regex> = OnceLock::new();
        #[allow(clippy::unwrap_used)]
        let pattern = LOCK.get_or_init(|| Regex::new(RE).unwrap());

        let mut criteria = Criteria::new();
        for param in params {
            let param = param.as_ref().trim();
            if let Some(value) = param.strip_prefix("distinct=") {
                criteria.distinct = value
                    .parse()
                    .map_err(|_| Error::Syntax(format!("invalid distinct flag '{value}'")))?;
                continue;
            }
            let captures = pattern
                .captures(param)
                .ok_or_else(|| Error::Syntax(format!("expected field.operator=value, got '{param}'")))?;
            criteria = criteria.filter(
                &captures["field"],
                captures["op"].parse()?,
                &captures["value"],
            );
        }
        Ok(criteria)
    }

    /// Check every condition against `T` and compile it.
    pub fn build<T: Target>(&self) -> Result<Spec<T>, Error> {
        let predicates = self
            .conditions
            .iter()
            .map(|c| compile::<T>(c))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Built {} criteria with {} conditions (distinct: {})",
            T::ENTITY,
            predicates.len(),
            self.distinct
        );
        Ok(Spec {
            predicates,
            distinct: self.distinct,
        })
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Equals(Scalar),
    NotEquals(Scalar),
    Specified(bool),
    In(Vec<Scalar>),
    NotIn(Vec<Scalar>),
    Contains(String),
    DoesNotContain(String),
    GreaterThan(Scalar),
    LessThan(Scalar),
    GreaterThanOrEqual(Scalar),
    LessThanOrEqual(Scalar),
    Between(Scalar, Scalar),
}

impl Predicate {
    fn matches(&self, value: &Scalar) -> bool {
        use std::cmp::Ordering::*;
        let cmp = |other: &Scalar| value.compare(other);
        let text = || value.as_text().map(str::to_lowercase);
        match self {
            Predicate::Equals(v) => value == v,
            Predicate::NotEquals(v) => value != v,
            Predicate::Specified(_) => true,
            Predicate::In(vs) => vs.contains(value),
            Predicate::NotIn(vs) => !vs.contains(value),
            Predicate::Contains(term) => text().is_some_and(|t| t.contains(term.as_str())),
            Predicate::DoesNotContain(term) => text().is_some_and(|t| !t.contains(term.as_str())),
            Predicate::GreaterThan(v) => cmp(v) == Some(Greater),
            Predicate::LessThan(v) => cmp(v) == Some(Less),
            Predicate::GreaterThanOrEqual(v) => matches!(cmp(v), Some(Greater | Equal)),
            Predicate::LessThanOrEqual(v) => matches!(cmp(v), Some(Less | Equal)),
            Predicate::Between(low, high) => {
                matches!(cmp(low), Some(Greater | Equal)) && matches!(cmp(high), Some(Less | Equal))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Compiled<F> {
    spec: FieldSpec<F>,
    predicate: Predicate,
}

impl<F: Copy> Compiled<F> {
    /// Number of ways `values` satisfy this condition.
    fn multiplicity(&self, values: &[Scalar]) -> usize {
        if let Predicate::Specified(specified) = self.predicate {
            return match (specified, self.spec.cardinality) {
                (true, Cardinality::Many) => values.len(),
                (true, _) => usize::from(!values.is_empty()),
                (false, _) => usize::from(values.is_empty()),
            };
        }
        let matching = values.iter().filter(|v| self.predicate.matches(v)).count();
        match self.spec.cardinality {
            Cardinality::Many => matching,
            Cardinality::Single | Cardinality::AnyOf => usize::from(matching > 0),
        }
    }
}

fn compile<T: Target>(condition: &Condition) -> Result<Compiled<T::Field>, Error> {
    let name = condition.field.as_str();
    let spec = T::field(name).ok_or_else(|| Error::UnknownField {
        entity: T::ENTITY,
        field: name.to_string(),
    })?;
    let unsupported = || Error::UnsupportedOperator {
        field: name.to_string(),
        operator: condition.operator,
    };
    let one = |raw: &str| value::parse(name, spec.kind, raw);
    let list = |raw: &str| {
        raw.split(',')
            .map(|v| value::parse(name, spec.kind, v))
            .collect::<Result<Vec<_>, _>>()
    };
    let raw = condition.value.as_str();

    let predicate = match condition.operator {
        Operator::Equals => Predicate::Equals(one(raw)?),
        Operator::NotEquals => Predicate::NotEquals(one(raw)?),
        Operator::Specified => Predicate::Specified(
            match value::parse(name, Kind::Bool, raw)? {
                Scalar::Bool(b) => b,
                _ => return Err(unsupported()),
            },
        ),
        Operator::In => Predicate::In(list(raw)?),
        Operator::NotIn => Predicate::NotIn(list(raw)?),
        Operator::Contains | Operator::DoesNotContain => {
            if !spec.kind.is_text() {
                return Err(unsupported());
            }
            let term = raw.trim().to_lowercase();
            if condition.operator == Operator::Contains {
                Predicate::Contains(term)
            } else {
                Predicate::DoesNotContain(term)
            }
        }
        op @ (Operator::GreaterThan
        | Operator::LessThan
        | Operator::GreaterThanOrEqual
        | Operator::LessThanOrEqual) => {
            if !spec.kind.is_ordered() {
                return Err(unsupported());
            }
            let v = one(raw)?;
            match op {
                Operator::GreaterThan => Predicate::GreaterThan(v),
                Operator::LessThan => Predicate::LessThan(v),
                Operator::GreaterThanOrEqual => Predicate::GreaterThanOrEqual(v),
                _ => Predicate::LessThanOrEqual(v),
            }
        }
        Operator::Between => {
            if !spec.kind.is_ordered() {
                return Err(unsupported());
            }
            match list(raw)?.as_slice() {
                [low, high] => Predicate::Between(low.clone(), high.clone()),
                _ => {
                    return Err(Error::InvalidValue {
                        field: name.to_string(),
                        value: raw.to_string(),
                        reason: "between expects two comma separated bounds".to_string(),
                    })
                }
            }
        }
    };
    Ok(Compiled { spec, predicate })
}

/// Compiled criteria for rows of `T`.
#[derive(Debug, Clone)]
pub struct Spec<T: Target> {
    predicates: Vec<Compiled<T::Field>>,
    distinct: bool,
}

impl<T: Target> Spec<T> {
    fn multiplicity(&self, graph: &Graph, row: &T::Item) -> usize {
        let mut total = 1;
        for compiled in &self.predicates {
            let values = T::values(graph, row, compiled.spec.field);
            total *= compiled.multiplicity(&values);
            if total == 0 {
                return 0;
            }
        }
        if self.distinct {
            total.min(1)
        } else {
            total
        }
    }

    fn matching(&self, graph: &Graph) -> impl Iterator<Item = T::Item> + '_ {
        let rows = T::rows(graph);
        let counts: Vec<usize> = rows.iter().map(|r| self.multiplicity(graph, r)).collect();
        rows.into_iter()
            .zip(counts)
            .flat_map(|(row, n)| std::iter::repeat(row).take(n))
    }

    pub fn find(&self, graph: &Graph) -> Vec<T::Item> {
        self.matching(graph).collect()
    }

    pub fn count(&self, graph: &Graph) -> usize {
        T::rows(graph)
            .iter()
            .map(|r| self.multiplicity(graph, r))
            .sum()
    }

    pub fn page(&self, graph: &Graph, paginated: Paginated) -> PaginatedResults<T::Item> {
        let number_of_items = self.count(graph);
        let size = paginated.page_size.get();
        let results = self
            .matching(graph)
            .skip(paginated.page.saturating_mul(size))
            .take(size)
            .collect();
        PaginatedResults {
            results,
            page: paginated.page,
            page_size: paginated.page_size,
            number_of_items,
            number_of_pages: number_of_items.div_ceil(size),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Paginated {
    pub page_size: NonZeroUsize,
    pub page: usize,
}

impl Default for Paginated {
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::MIN.saturating_add(49),
            page: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResults<R> {
    pub results: Vec<R>,
    pub page: usize,
    pub page_size: NonZeroUsize,
    pub number_of_items: usize,
    pub number_of_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strings() {
        let criteria = Criteria::parse(&[
            "name.contains=lodash",
            "licensesShortIdentifier.in=MIT,Apache-2.0",
            "distinct=true",
        ])
        .unwrap();
        assert!(criteria.distinct);
        assert_eq!(
            criteria.conditions,
            vec![
                Condition {
                    field: "name".to_string(),
                    operator: Operator::Contains,
                    value: "lodash".to_string(),
                },
                Condition {
                    field: "licensesShortIdentifier".to_string(),
                    operator: Operator::In,
                    value: "MIT,Apache-2.0".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Criteria::parse(&["name"]), Err(Error::Syntax(_))));
        assert!(matches!(
            Criteria::parse(&["name.like=x"]),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            Criteria::parse(&["distinct=maybe"]),
            Err(Error::Syntax(_))
        ));
    }

    #[test]
    fn test_operator_names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(op.to_string().parse::<Operator>().unwrap(), op);
        }
    }
}
