//! MongoDB backend tests against a throwaway container.
//!
//! These need a Docker daemon:
//!
//! ```text
//! cargo test -p folio-db --test mongo -- --ignored
//! ```

use folio_db::{
    bson::{doc, Document},
    DocumentStore, FindOptions, IndexSpec, MongoStore, SortOrder, StoreError,
};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mongo::Mongo;

/// Store bound to a fresh container; the container stops on drop.
struct TestMongo {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    store: MongoStore,
}

impl TestMongo {
    async fn new() -> Self {
        let container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");

        let uri = format!("mongodb://127.0.0.1:{port}");
        let store = MongoStore::connect(&uri, "folio_test", Some("folio-db-tests"))
            .await
            .expect("Failed to configure MongoDB client");
        store.ping().await.expect("MongoDB is not reachable");

        Self { container, store }
    }

    async fn with_unique_name(self) -> Self {
        self.store
            .ensure_index(&IndexSpec::unique("books", "name"))
            .await
            .unwrap();
        self
    }
}

fn book(name: &str, pages: i64) -> Document {
    doc! { "name": name, "pages": pages }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn duplicate_insert_is_reported_as_duplicate_key() {
    let db = TestMongo::new().await.with_unique_name().await;

    db.store.insert_one("books", book("Dune", 412)).await.unwrap();
    let err = db
        .store
        .insert_one("books", book("Dune", 500))
        .await
        .unwrap_err();

    match err {
        StoreError::DuplicateKey { collection, key } => {
            assert_eq!(collection, "books");
            assert!(key.contains("Dune"), "unexpected key: {key}");
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn duplicate_update_is_reported_as_duplicate_key() {
    let db = TestMongo::new().await.with_unique_name().await;

    db.store.insert_one("books", book("Dune", 412)).await.unwrap();
    let emma = db.store.insert_one("books", book("Emma", 474)).await.unwrap();

    let err = db
        .store
        .update_one("books", doc! { "_id": emma }, doc! { "name": "Dune" })
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::DuplicateKey { .. }),
        "expected DuplicateKey, got {err:?}"
    );
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn update_returns_document_after_change() {
    let db = TestMongo::new().await;
    let id = db.store.insert_one("books", book("Dune", 412)).await.unwrap();

    let updated = db
        .store
        .update_one("books", doc! { "_id": id }, doc! { "pages": 500_i64 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get_i64("pages").unwrap(), 500);

    let unchanged = db
        .store
        .update_one("books", doc! { "_id": id }, Document::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.get_object_id("_id").unwrap(), id);
    assert_eq!(unchanged.get_i64("pages").unwrap(), 500);

    let missing = db
        .store
        .update_one("books", doc! { "name": "Ubik" }, Document::new())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn find_applies_filter_and_sort() {
    let db = TestMongo::new().await;
    for (name, pages) in [("Dune", 412), ("Emma", 474), ("Ubik", 202)] {
        db.store.insert_one("books", book(name, pages)).await.unwrap();
    }

    let documents = db
        .store
        .find(
            "books",
            doc! { "pages": { "$gt": 300_i64 } },
            FindOptions::default().sort_by("pages", SortOrder::Descending),
        )
        .await
        .unwrap();

    let names: Vec<&str> = documents
        .iter()
        .map(|document| document.get_str("name").unwrap())
        .collect();
    assert_eq!(names, ["Emma", "Dune"]);

    assert!(db.store.delete_one("books", doc! { "name": "Ubik" }).await.unwrap());
    assert!(!db.store.delete_one("books", doc! { "name": "Ubik" }).await.unwrap());
}
