//! Generic CRUD handlers.
//!
//! [`crud_router`] binds the five standard operations to any
//! [`DocumentModel`], so a resource module only declares its model:
//!
//! | Method | Path    | Success                 |
//! |--------|---------|-------------------------|
//! | GET    | `/`     | 200, array of documents |
//! | POST   | `/`     | 201, created document   |
//! | GET    | `/{id}` | 200, document           |
//! | PATCH  | `/{id}` | 200, updated document   |
//! | DELETE | `/{id}` | 204, empty body         |

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use folio_db::DocumentStore;
use folio_odm::{DocumentModel, ListQuery, Model};
use serde_json::{json, Value};

use crate::error::AppError;

/// Per-resource handler options.
#[derive(Debug, Clone, Default)]
pub struct CrudOptions {
    populate: Vec<&'static str>,
}

impl CrudOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand the named virtual field on get-one responses.
    pub fn populate(mut self, virtual_field: &'static str) -> Self {
        self.populate.push(virtual_field);
        self
    }
}

struct FactoryState<M> {
    model: Model<M>,
    options: Arc<CrudOptions>,
}

impl<M> Clone for FactoryState<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            options: Arc::clone(&self.options),
        }
    }
}

/// Build the CRUD router for `M`. Mount it under the resource's base path.
pub fn crud_router<M: DocumentModel>(store: Arc<dyn DocumentStore>, options: CrudOptions) -> Router {
    let state = FactoryState {
        model: Model::<M>::new(store),
        options: Arc::new(options),
    };

    Router::new()
        .route("/", get(list::<M>).post(create::<M>))
        .route(
            "/{id}",
            get(get_one::<M>).patch(update::<M>).delete(delete::<M>),
        )
        .with_state(state)
}

fn not_found<M: DocumentModel>() -> AppError {
    AppError::not_found(format!("No {} found with that ID", M::NAME))
}

async fn list<M: DocumentModel>(
    State(state): State<FactoryState<M>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<M>>, AppError> {
    let query = ListQuery::parse(M::schema(), &params)?;
    let documents = state.model.list(query).await?;
    Ok(Json(documents))
}

async fn get_one<M: DocumentModel>(
    State(state): State<FactoryState<M>>,
    Path(id): Path<String>,
) -> Result<Json<M>, AppError> {
    state
        .model
        .find_by_id(&id, &state.options.populate)
        .await?
        .map(Json)
        .ok_or_else(not_found::<M>)
}

async fn create<M: DocumentModel>(
    State(state): State<FactoryState<M>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<M>), AppError> {
    let Json(payload) = payload?;
    let document = state.model.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn update<M: DocumentModel>(
    State(state): State<FactoryState<M>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<M>, AppError> {
    let Json(payload) = payload?;
    state
        .model
        .update_by_id(&id, &payload)
        .await?
        .map(Json)
        .ok_or_else(not_found::<M>)
}

async fn delete<M: DocumentModel>(
    State(state): State<FactoryState<M>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.model.delete_by_id(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<M>())
    }
}

fn component_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// OpenAPI fragment describing the routes [`crud_router`] serves for `M`.
///
/// Paths are relative to the module mount point.
pub fn openapi<M: DocumentModel>(options: &CrudOptions) -> Value {
    let name = component_name(M::NAME);
    let input = format!("{name}Input");
    let tag = M::COLLECTION;

    let mut output_schema = M::schema().json_schema(false);
    for virtual_field in M::virtuals() {
        if options.populate.contains(&virtual_field.name) {
            output_schema["properties"][virtual_field.name] = json!({
                "type": "array",
                "items": { "type": "object" },
                "description": format!("Related {} (get-one only)", virtual_field.collection),
                "readOnly": true
            });
        }
    }

    let document_ref = json!({ "$ref": format!("#/components/schemas/{name}") });
    let input_ref = json!({ "$ref": format!("#/components/schemas/{input}") });
    let error = |description: &str| {
        json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        })
    };
    let id_param = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    });

    let mut fragment = json!({
        "paths": {
            "": {
                "get": {
                    "tags": [tag],
                    "summary": format!("List {tag}"),
                    "parameters": [{
                        "name": "sort",
                        "in": "query",
                        "required": false,
                        "description": "Comma-separated fields, prefix with '-' for descending",
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": {
                            "description": "Matching documents",
                            "content": {
                                "application/json": {
                                    "schema": { "type": "array", "items": document_ref }
                                }
                            }
                        },
                        "400": error("Invalid filter or sort")
                    }
                },
                "post": {
                    "tags": [tag],
                    "summary": format!("Create a {}", M::NAME),
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": input_ref } }
                    },
                    "responses": {
                        "201": {
                            "description": "Created",
                            "content": { "application/json": { "schema": document_ref } }
                        },
                        "400": error("Validation failed"),
                        "409": error("Duplicate value")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "tags": [tag],
                    "summary": format!("Get a {}", M::NAME),
                    "parameters": [id_param],
                    "responses": {
                        "200": {
                            "description": "Found",
                            "content": { "application/json": { "schema": document_ref } }
                        },
                        "404": error("Not found")
                    }
                },
                "patch": {
                    "tags": [tag],
                    "summary": format!("Update a {}", M::NAME),
                    "parameters": [id_param],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": input_ref } }
                    },
                    "responses": {
                        "200": {
                            "description": "Updated",
                            "content": { "application/json": { "schema": document_ref } }
                        },
                        "400": error("Validation failed"),
                        "404": error("Not found"),
                        "409": error("Duplicate value")
                    }
                },
                "delete": {
                    "tags": [tag],
                    "summary": format!("Delete a {}", M::NAME),
                    "parameters": [id_param],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": error("Not found")
                    }
                }
            }
        },
        "components": { "schemas": {} }
    });

    let schemas = &mut fragment["components"]["schemas"];
    schemas[name.as_str()] = output_schema;
    schemas[input.as_str()] = M::schema().json_schema(true);

    fragment
}
