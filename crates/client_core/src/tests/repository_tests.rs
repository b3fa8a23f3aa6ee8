use super::*;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use shared::domain::NO_PHOTO;
use tokio::{net::TcpListener, sync::Mutex};
use uuid::Uuid;

struct ServerState {
    contacts: Mutex<Vec<Contact>>,
    seen_auth: Mutex<Option<String>>,
    broken: AtomicBool,
}

impl ServerState {
    fn new(contacts: Vec<Contact>) -> Arc<Self> {
        Arc::new(Self {
            contacts: Mutex::new(contacts),
            seen_auth: Mutex::new(None),
            broken: AtomicBool::new(false),
        })
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: "no such contact".to_string(),
        }),
    )
}

async fn list_contacts(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Contact>>> {
    *state.seen_auth.lock().await = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if state.broken.load(Ordering::SeqCst) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                message: "database exploded".to_string(),
            }),
        ));
    }
    Ok(Json(state.contacts.lock().await.clone()))
}

async fn create_contact(
    State(state): State<Arc<ServerState>>,
    Json(draft): Json<ContactDraft>,
) -> ApiResult<Json<Contact>> {
    if draft.name.trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody {
                message: "name must not be empty".to_string(),
            }),
        ));
    }
    let created = draft.into_contact(ContactId(Uuid::new_v4().to_string()));
    state.contacts.lock().await.push(created.clone());
    Ok(Json(created))
}

async fn get_contact(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Contact>> {
    state
        .contacts
        .lock()
        .await
        .iter()
        .find(|c| c.id.0 == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn update_contact(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(draft): Json<ContactDraft>,
) -> ApiResult<Json<Contact>> {
    let mut contacts = state.contacts.lock().await;
    let Some(held) = contacts.iter_mut().find(|c| c.id.0 == id) else {
        return Err(not_found());
    };
    *held = draft.into_contact(ContactId(id));
    Ok(Json(held.clone()))
}

async fn delete_contact(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut contacts = state.contacts.lock().await;
    let before = contacts.len();
    contacts.retain(|c| c.id.0 != id);
    if contacts.len() == before {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Serves the contact resource under `/api` on an OS-assigned port and
/// returns the base URL (without a trailing slash, on purpose).
async fn spawn_server(state: Arc<ServerState>) -> String {
    let api = Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .with_state(state);
    let app = Router::new().nest("/api", api);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/api")
}

fn repository(base: &str, token: Arc<dyn TokenProvider>) -> HttpContactRepository {
    HttpContactRepository::new(Url::parse(base).expect("base url"), token)
}

fn seed(id: &str, name: &str) -> Contact {
    Contact {
        id: ContactId::from(id),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
        photo_url: NO_PHOTO.to_string(),
    }
}

fn valid_draft(name: &str) -> ContactDraft {
    ContactDraft {
        name: name.to_string(),
        email: "foo@bar.com".to_string(),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
        photo_url: NO_PHOTO.to_string(),
    }
}

#[tokio::test]
async fn crud_round_trip_against_live_server() {
    let state = ServerState::new(Vec::new());
    let base = spawn_server(Arc::clone(&state)).await;
    let repo = repository(&base, Arc::new(NoToken));

    let created = repo.create(&valid_draft("Ana")).await.expect("create");
    assert!(!created.id.0.is_empty());
    assert_eq!(created.name, "Ana");

    let listed = repo.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    let updated = repo
        .update(&created.id, &valid_draft("Ana Maria"))
        .await
        .expect("update");
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "Ana Maria");

    let fetched = repo.get_by_id(&created.id).await.expect("get");
    assert_eq!(fetched.name, "Ana Maria");

    repo.delete(&created.id).await.expect("delete");
    assert!(repo.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn missing_contact_maps_to_not_found() {
    let state = ServerState::new(vec![seed("a", "Ana")]);
    let base = spawn_server(state).await;
    let repo = repository(&base, Arc::new(NoToken));
    let ghost = ContactId::from("ghost");

    assert!(matches!(
        repo.get_by_id(&ghost).await,
        Err(DirectoryError::NotFound)
    ));
    assert!(matches!(
        repo.update(&ghost, &valid_draft("Nobody")).await,
        Err(DirectoryError::NotFound)
    ));
    assert!(matches!(
        repo.delete(&ghost).await,
        Err(DirectoryError::NotFound)
    ));
}

#[tokio::test]
async fn server_rejection_carries_its_message() {
    let state = ServerState::new(Vec::new());
    let base = spawn_server(state).await;
    let repo = repository(&base, Arc::new(NoToken));

    let err = repo
        .create(&valid_draft(""))
        .await
        .expect_err("server-side rejection");
    match err {
        DirectoryError::Rejected { message } => assert_eq!(message, "name must not be empty"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn internal_error_maps_to_server_with_status() {
    let state = ServerState::new(vec![seed("a", "Ana")]);
    let base = spawn_server(Arc::clone(&state)).await;
    let repo = repository(&base, Arc::new(NoToken));

    state.broken.store(true, Ordering::SeqCst);
    match repo.list().await.expect_err("broken server") {
        DirectoryError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database exploded");
        }
        other => panic!("expected Server, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_maps_to_network() {
    // Bind and immediately drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let repo = repository(&format!("http://{addr}/api"), Arc::new(NoToken));
    assert!(matches!(
        repo.list().await,
        Err(DirectoryError::Network { .. })
    ));
}

#[tokio::test]
async fn bearer_token_is_attached_when_present() {
    let state = ServerState::new(Vec::new());
    let base = spawn_server(Arc::clone(&state)).await;

    let repo = repository(&base, Arc::new(StaticToken("sekrit".to_string())));
    repo.list().await.expect("list");
    assert_eq!(
        state.seen_auth.lock().await.as_deref(),
        Some("Bearer sekrit")
    );

    let repo = repository(&base, Arc::new(NoToken));
    repo.list().await.expect("list");
    assert_eq!(state.seen_auth.lock().await.as_deref(), None);
}
