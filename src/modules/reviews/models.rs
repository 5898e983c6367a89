use folio_odm::{DocumentModel, FieldSpec, Schema};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static REVIEW_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        FieldSpec::text("review")
            .required("Review can not be empty")
            .trim()
            .max_length(500, "A review must have less or equal then 500 characters"),
        FieldSpec::decimal("rating")
            .required("A review must have a rating")
            .min(1.0, "Rating must be above 1.0")
            .max(5.0, "Rating must be below 5.0")
            .round_to(1),
        FieldSpec::object_id("book")
            .describe("Id of the reviewed book")
            .required("Review must belong to a book"),
    ])
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename(deserialize = "_id"))]
    pub id: String,
    pub review: String,
    pub rating: f64,
    pub book: String,
}

impl DocumentModel for Review {
    const NAME: &'static str = "review";
    const COLLECTION: &'static str = "reviews";

    fn schema() -> &'static Schema {
        &REVIEW_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn book_must_be_an_object_id() {
        let errors = Review::schema()
            .validate_create(&json!({ "review": "Great", "rating": 5, "book": "dune" }))
            .unwrap_err();
        assert_eq!(errors.violations()[0].field, "book");
    }

    #[test]
    fn rating_is_rounded() {
        let document = Review::schema()
            .validate_create(&json!({
                "review": "Great",
                "rating": 4.44,
                "book": "65f1c0ffee0000000000beef"
            }))
            .unwrap();
        assert_eq!(document.get_f64("rating").unwrap(), 4.4);
    }
}
