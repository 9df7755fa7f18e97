//! Simple REST API server example for the card assignment engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /addresses` - Register an address in the in-memory registry
//! - `POST /users` - Register a field agent
//! - `POST /cards` - Create a card from free addresses
//! - `PUT /cards/{id}/addresses` - Replace a card's membership
//! - `POST /designations` - Designate one or many cards to a user
//! - `POST /cards/{id}/return` - Return a card held by a user
//! - `DELETE /cards/{id}` - Delete a card
//! - `GET /cards/{id}` - Get a card snapshot
//! - `GET /cards/{id}/history` - Get a card's assignment history
//! - `GET /groups/{group}/free-addresses` - List unclaimed addresses
//! - `GET /users/{id}/cards` - List cards held by a user
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:3000/addresses \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": "A1", "group": "north", "street": "Rua Aurora", "number": "12", "neighborhood": "Centro", "city": "Curitiba", "confirmed": false, "active": true}'
//!
//! curl -X POST http://localhost:3000/users \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": "U1", "name": "Ana"}'
//!
//! curl -X POST http://localhost:3000/cards \
//!   -H "Content-Type: application/json" \
//!   -d '{"group": "north", "addresses": ["A1"]}'
//!
//! curl http://localhost:3000/groups/north/free-addresses
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use fieldcards_rs::{
    AddressId, AddressRegistry, AddressSummary, Card, CardError, CardId, Engine, GroupId,
    HistoryEntry, InMemoryAddressBook, InMemoryUserDirectory, UserDirectory, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for registering a field agent.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub id: String,
    pub name: String,
}

/// Request body for creating a card.
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub group: String,
    pub addresses: Vec<String>,
}

/// Request body for replacing a card's membership.
#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub addresses: Vec<String>,
}

/// Request body for designating cards.
#[derive(Debug, Deserialize)]
pub struct DesignationRequest {
    pub card_ids: Vec<String>,
    pub user_id: String,
}

/// Request body for returning a card.
#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub user_id: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the engine and its registries.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub addresses: Arc<InMemoryAddressBook>,
    pub users: Arc<InMemoryUserDirectory>,
}

impl AppState {
    fn new() -> Self {
        let addresses = Arc::new(InMemoryAddressBook::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let engine = Arc::new(Engine::new(
            Arc::clone(&addresses) as Arc<dyn AddressRegistry>,
            Arc::clone(&users) as Arc<dyn UserDirectory>,
        ));
        Self {
            engine,
            addresses,
            users,
        }
    }
}

// === Error Handling ===

/// Wrapper for converting `CardError` into HTTP responses.
pub struct AppError(CardError);

impl From<CardError> for AppError {
    fn from(err: CardError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CardError::InvalidMembership { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_MEMBERSHIP")
            }
            CardError::IllegalTransition => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
            CardError::AssignmentMismatch => (StatusCode::FORBIDDEN, "ASSIGNMENT_MISMATCH"),
            CardError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CardError::ConcurrencyConflict => {
                (StatusCode::SERVICE_UNAVAILABLE, "CONCURRENCY_CONFLICT")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /addresses - Register an address.
async fn register_address(
    State(state): State<AppState>,
    Json(summary): Json<AddressSummary>,
) -> StatusCode {
    state.addresses.insert(summary);
    StatusCode::CREATED
}

/// POST /users - Register a field agent.
async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> StatusCode {
    state.users.insert(request.id, request.name);
    StatusCode::CREATED
}

/// POST /cards - Create a card.
async fn create_card(
    State(state): State<AppState>,
    Json(request): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>), AppError> {
    let addresses = request.addresses.into_iter().map(AddressId::from).collect();
    let card = state
        .engine
        .create_card(addresses, GroupId::from(request.group))?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// PUT /cards/{id}/addresses - Replace a card's membership.
async fn update_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MembershipRequest>,
) -> Result<Json<Card>, AppError> {
    let addresses = request.addresses.into_iter().map(AddressId::from).collect();
    let card = state
        .engine
        .update_card_membership(&CardId::from(id), addresses)?;
    Ok(Json(card))
}

/// POST /designations - Designate cards to a user.
async fn designate_cards(
    State(state): State<AppState>,
    Json(request): Json<DesignationRequest>,
) -> Result<Json<Vec<Card>>, AppError> {
    let card_ids: Vec<CardId> = request.card_ids.into_iter().map(CardId::from).collect();
    let cards = state
        .engine
        .designate_cards(&card_ids, &UserId::from(request.user_id))?;
    Ok(Json(cards))
}

/// POST /cards/{id}/return - Return a card.
async fn return_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReturnRequest>,
) -> Result<Json<Card>, AppError> {
    let card = state
        .engine
        .return_card(&CardId::from(id), &UserId::from(request.user_id))?;
    Ok(Json(card))
}

/// DELETE /cards/{id} - Delete a card.
async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_card(&CardId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /cards/{id} - Get a card snapshot.
async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Card>, AppError> {
    state
        .engine
        .get_card(&CardId::from(id))
        .map(Json)
        .ok_or(AppError(CardError::NotFound))
}

/// GET /cards/{id}/history - Get a card's assignment history.
async fn card_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = state.engine.history_of(&CardId::from(id))?;
    Ok(Json(history))
}

/// GET /groups/{group}/free-addresses - List unclaimed addresses.
async fn free_addresses(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Json<Vec<AddressId>> {
    Json(state.engine.list_free_addresses(&GroupId::from(group)))
}

/// GET /users/{id}/cards - List cards held by a user.
async fn user_cards(State(state): State<AppState>, Path(id): Path<String>) -> Json<Vec<Card>> {
    Json(state.engine.cards_for_user(&UserId::from(id)))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/addresses", post(register_address))
        .route("/users", post(register_user))
        .route("/cards", post(create_card))
        .route("/cards/{id}", get(get_card).delete(delete_card))
        .route("/cards/{id}/addresses", put(update_membership))
        .route("/cards/{id}/return", post(return_card))
        .route("/cards/{id}/history", get(card_history))
        .route("/designations", post(designate_cards))
        .route("/groups/{group}/free-addresses", get(free_addresses))
        .route("/users/{id}/cards", get(user_cards))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let state = AppState::new();

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Field Cards API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST   /addresses                     - Register an address");
    println!("  POST   /users                         - Register a field agent");
    println!("  POST   /cards                         - Create a card");
    println!("  PUT    /cards/:id/addresses           - Replace membership");
    println!("  POST   /designations                  - Designate cards");
    println!("  POST   /cards/:id/return              - Return a card");
    println!("  DELETE /cards/:id                     - Delete a card");
    println!("  GET    /cards/:id                     - Get a card");
    println!("  GET    /cards/:id/history             - Assignment history");
    println!("  GET    /groups/:group/free-addresses  - Free addresses");
    println!("  GET    /users/:id/cards               - Cards held by a user");

    axum::serve(listener, app).await.unwrap();
}
