//! Filter evaluation for the in-memory backend.
//!
//! Supports the subset of MongoDB query syntax the ODM emits: field
//! equality, the comparison operators `$eq $ne $gt $gte $lt $lte`, the set
//! operators `$in $nin`, `$exists`, and the logical `$and $or`.

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};

/// Normalized view of a BSON value used for comparisons.
#[derive(Debug, PartialEq)]
enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    ObjectId([u8; 12]),
    DateTime(i64),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(value: &'a Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(value.bytes()),
            Bson::DateTime(value) => Comparable::DateTime(value.timestamp_millis()),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    /// Rank of the value's type in MongoDB's cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Other(_) => 3,
            Comparable::ObjectId(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::Other(a), Comparable::Other(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Equality with numeric widening, so `Int64(3)` equals `Double(3.0)`.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left).compare(&Comparable::from(right)) == Some(Ordering::Equal)
}

/// Total order used for sorting: missing and null first, then by type rank,
/// then by value.
pub(crate) fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let null = Bson::Null;
    let left = Comparable::from(left.unwrap_or(&null));
    let right = Comparable::from(right.unwrap_or(&null));

    left.compare(&right)
        .unwrap_or_else(|| left.type_rank().cmp(&right.type_rank()))
}

/// Evaluates MongoDB-style filters against in-memory documents.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn matches(&self, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(Self::clauses(key, condition)?)?,
                "$or" => self.any(Self::clauses(key, condition)?)?,
                op if op.starts_with('$') => {
                    return Err(StoreError::UnsupportedFilter(format!(
                        "top-level operator '{op}'"
                    )))
                }
                field => self.field_matches(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn clauses<'f>(key: &str, condition: &'f Bson) -> StoreResult<Vec<&'f Document>> {
        let Bson::Array(items) = condition else {
            return Err(StoreError::UnsupportedFilter(format!(
                "'{key}' expects an array of documents"
            )));
        };

        items
            .iter()
            .map(|item| {
                item.as_document().ok_or_else(|| {
                    StoreError::UnsupportedFilter(format!("'{key}' expects an array of documents"))
                })
            })
            .collect()
    }

    fn all(&self, clauses: Vec<&Document>) -> StoreResult<bool> {
        for clause in clauses {
            if !self.matches(clause)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any(&self, clauses: Vec<&Document>) -> StoreResult<bool> {
        for clause in clauses {
            if self.matches(clause)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> StoreResult<bool> {
        let value = self.document.get(field);

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (op, operand) in operators {
                    if !Self::apply(op, value, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            expected => Ok(Self::equals(value, expected)),
        }
    }

    /// MongoDB treats a missing field as equal to `null`.
    fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
        match value {
            Some(value) => values_equal(value, expected),
            None => matches!(expected, Bson::Null),
        }
    }

    fn apply(op: &str, value: Option<&Bson>, operand: &Bson) -> StoreResult<bool> {
        let ordering = || {
            value.and_then(|value| Comparable::from(value).compare(&Comparable::from(operand)))
        };

        Ok(match op {
            "$eq" => Self::equals(value, operand),
            "$ne" => !Self::equals(value, operand),
            "$gt" => ordering() == Some(Ordering::Greater),
            "$gte" => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            "$lt" => ordering() == Some(Ordering::Less),
            "$lte" => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            "$in" => Self::candidates(op, operand)?
                .iter()
                .any(|candidate| Self::equals(value, candidate)),
            "$nin" => !Self::candidates(op, operand)?
                .iter()
                .any(|candidate| Self::equals(value, candidate)),
            "$exists" => value.is_some() == operand.as_bool().unwrap_or(true),
            other => {
                return Err(StoreError::UnsupportedFilter(format!(
                    "field operator '{other}'"
                )))
            }
        })
    }

    fn candidates<'o>(op: &str, operand: &'o Bson) -> StoreResult<&'o Vec<Bson>> {
        operand
            .as_array()
            .ok_or_else(|| StoreError::UnsupportedFilter(format!("'{op}' expects an array")))
    }
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn book() -> Document {
        doc! { "name": "Dune", "pages": 412_i64, "ratingsAverage": 4.5, "secretBook": false }
    }

    #[test]
    fn equality_widens_numbers() {
        let document = book();
        let evaluator = DocumentEvaluator::new(&document);
        assert!(evaluator.matches(&doc! { "pages": 412.0 }).unwrap());
        assert!(!evaluator.matches(&doc! { "pages": 413 }).unwrap());
    }

    #[test]
    fn ne_matches_missing_fields() {
        let document = doc! { "name": "Dune" };
        let evaluator = DocumentEvaluator::new(&document);
        assert!(evaluator
            .matches(&doc! { "secretBook": { "$ne": true } })
            .unwrap());
    }

    #[test]
    fn range_operators_combine() {
        let document = book();
        let evaluator = DocumentEvaluator::new(&document);
        assert!(evaluator
            .matches(&doc! { "pages": { "$gte": 400, "$lt": 500 } })
            .unwrap());
        assert!(!evaluator
            .matches(&doc! { "ratingsAverage": { "$gt": 4.5 } })
            .unwrap());
    }

    #[test]
    fn and_requires_every_clause() {
        let document = book();
        let evaluator = DocumentEvaluator::new(&document);
        let filter = doc! {
            "$and": [
                { "secretBook": true },
                { "secretBook": { "$ne": true } },
            ]
        };
        assert!(!evaluator.matches(&filter).unwrap());
    }

    #[test]
    fn in_operator_checks_membership() {
        let document = book();
        let evaluator = DocumentEvaluator::new(&document);
        assert!(evaluator
            .matches(&doc! { "name": { "$in": ["Emma", "Dune"] } })
            .unwrap());
        assert!(evaluator
            .matches(&doc! { "name": { "$nin": ["Emma"] } })
            .unwrap());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let document = book();
        let evaluator = DocumentEvaluator::new(&document);
        let result = evaluator.matches(&doc! { "name": { "$regex": "^D" } });
        assert!(matches!(result, Err(StoreError::UnsupportedFilter(_))));
    }

    #[test]
    fn sort_order_puts_missing_first() {
        let value = Bson::Int32(1);
        assert_eq!(sort_order(None, Some(&value)), Ordering::Less);
        assert_eq!(
            sort_order(Some(&Bson::Double(2.5)), Some(&value)),
            Ordering::Greater
        );
    }
}
