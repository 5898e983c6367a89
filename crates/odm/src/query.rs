//! Query-string parsing for list operations.
//!
//! Supported forms:
//!
//! - `field=value`: equality
//! - `field[gte]=value` (also `gt`, `lte`, `lt`, `ne`): comparison
//! - `sort=a,-b`: ascending `a`, then descending `b`
//!
//! Only schema fields may be filtered; values are parsed with the field's
//! declared kind.

use folio_db::{
    bson::{Bson, Document},
    FindOptions, SortOrder,
};

use crate::{
    error::{ModelError, ModelResult},
    schema::Schema,
};

const OPERATORS: &[&str] = &["gte", "gt", "lte", "lt", "ne"];

/// A parsed list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Document,
    pub options: FindOptions,
}

impl ListQuery {
    pub fn parse(schema: &Schema, params: &[(String, String)]) -> ModelResult<Self> {
        let mut query = ListQuery::default();

        for (key, value) in params {
            if key == "sort" {
                query.options = parse_sort(schema, value)?;
                continue;
            }

            let (field, operator) = split_key(key)?;
            let spec = schema
                .field(field)
                .ok_or_else(|| ModelError::InvalidQuery(format!("unknown filter field '{field}'")))?;
            let parsed = spec.parse_str(value).map_err(ModelError::InvalidQuery)?;

            add_condition(&mut query.filter, field, operator, parsed);
        }

        Ok(query)
    }
}

fn split_key(key: &str) -> ModelResult<(&str, &str)> {
    let Some((field, rest)) = key.split_once('[') else {
        return Ok((key, "eq"));
    };

    let operator = rest
        .strip_suffix(']')
        .filter(|operator| OPERATORS.contains(operator))
        .ok_or_else(|| ModelError::InvalidQuery(format!("unsupported filter '{key}'")))?;

    Ok((field, operator))
}

fn add_condition(filter: &mut Document, field: &str, operator: &str, value: Bson) {
    let key = format!("${operator}");

    match filter.get_mut(field) {
        Some(Bson::Document(conditions)) => {
            conditions.insert(key, value);
        }
        _ => {
            let mut conditions = Document::new();
            conditions.insert(key, value);
            filter.insert(field, conditions);
        }
    }
}

fn parse_sort(schema: &Schema, raw: &str) -> ModelResult<FindOptions> {
    let mut options = FindOptions::default();

    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (field, order) = match part.strip_prefix('-') {
            Some(field) => (field, SortOrder::Descending),
            None => (part, SortOrder::Ascending),
        };

        if field != "_id" && schema.field(field).is_none() {
            return Err(ModelError::InvalidQuery(format!("unknown sort field '{field}'")));
        }
        options = options.sort_by(field, order);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use folio_db::bson::doc;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::text("name"),
            FieldSpec::integer("pages"),
            FieldSpec::decimal("ratingsAverage"),
            FieldSpec::boolean("secretBook"),
        ])
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_params_match_everything() {
        let query = ListQuery::parse(&schema(), &[]).unwrap();
        assert!(query.filter.is_empty());
        assert!(query.options.sort.is_empty());
    }

    #[test]
    fn equality_values_are_typed() {
        let query =
            ListQuery::parse(&schema(), &params(&[("pages", "412"), ("secretBook", "false")]))
                .unwrap();
        assert_eq!(
            query.filter,
            doc! { "pages": { "$eq": 412_i64 }, "secretBook": { "$eq": false } }
        );
    }

    #[test]
    fn operators_on_one_field_are_merged() {
        let query = ListQuery::parse(
            &schema(),
            &params(&[("ratingsAverage[gte]", "4"), ("ratingsAverage[lt]", "4.8")]),
        )
        .unwrap();
        assert_eq!(
            query.filter,
            doc! { "ratingsAverage": { "$gte": 4.0, "$lt": 4.8 } }
        );
    }

    #[test]
    fn sort_accepts_descending_prefix() {
        let query = ListQuery::parse(&schema(), &params(&[("sort", "-ratingsAverage,name")]))
            .unwrap();
        assert_eq!(
            query.options,
            FindOptions::default()
                .sort_by("ratingsAverage", SortOrder::Descending)
                .sort_by("name", SortOrder::Ascending)
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ListQuery::parse(&schema(), &params(&[("author", "x")])).unwrap_err();
        assert!(matches!(err, ModelError::InvalidQuery(_)));

        let err = ListQuery::parse(&schema(), &params(&[("sort", "author")])).unwrap_err();
        assert!(matches!(err, ModelError::InvalidQuery(_)));
    }

    #[test]
    fn unsupported_operators_are_rejected() {
        let err = ListQuery::parse(&schema(), &params(&[("pages[regex]", "1")])).unwrap_err();
        assert!(matches!(err, ModelError::InvalidQuery(_)));
    }

    #[test]
    fn uncoercible_values_are_rejected() {
        let err = ListQuery::parse(&schema(), &params(&[("pages[gt]", "many")])).unwrap_err();
        assert!(
            matches!(err, ModelError::InvalidQuery(message) if message == "pages must be a valid integer")
        );
    }
}
