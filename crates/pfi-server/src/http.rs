//! # HTTP surface of one PFI
//!
//! ## Routes
//!
//! ```text
//! GET  /                          banner
//! GET  /did                       this PFI's DID
//! GET  /offerings                 { data: [Offering] }
//! GET  /offerings/{id}            Offering
//! POST /exchanges/{id}/rfq        RFQ   → 202 + signed Quote
//! POST /exchanges/{id}            RFQ   (same as /rfq)
//! POST /exchanges/{id}/order      Order → 202, fulfilment runs in the background
//! POST /exchanges/{id}/close      Close → 202
//! GET  /exchanges/{id}            { data: [ProtocolMessage] }
//! GET  /exchanges?did=            { data: [[ProtocolMessage]] }
//! GET  /vc?name=&country=&did=    Credential (issuer only)
//! ```
//!
//! ## Error Mapping
//!
//! | Error category | Status                            |
//! |----------------|-----------------------------------|
//! | Validation     | 400, 404 not found, 409 conflict, 403 not allowed |
//! | Signature      | 401                               |
//! | Compliance     | 503                               |
//! | Dependency     | 503                               |
//! | Internal       | 500                               |

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pfi_compliance::{CredentialIssuer, IssuanceOutcome, RefusalReason};
use pfi_exchange::Pfi;
use pfi_types::{Did, ErrorCategory, ExchangeId, OfferingId, PfiError, ProtocolMessage};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const BANNER: &str = "Please use the tbdex protocol to communicate with this server or a suitable library: https://github.com/TBD54566975/tbdex-protocol";

/// Shared state of one PFI's router.
#[derive(Clone)]
pub struct AppState {
    pfi: Arc<Pfi>,
    issuer: Option<Arc<CredentialIssuer>>,
}

impl AppState {
    #[must_use]
    pub fn new(pfi: Arc<Pfi>) -> Self {
        Self { pfi, issuer: None }
    }

    /// Also serve `GET /vc` with `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<CredentialIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }
}

/// Build the router for one PFI.
pub fn router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/", get(banner))
        .route("/did", get(did))
        .route("/offerings", get(list_offerings))
        .route("/offerings/{offering_id}", get(get_offering))
        .route("/exchanges", get(list_exchanges))
        .route("/exchanges/{exchange_id}", get(get_exchange).post(submit_rfq))
        .route("/exchanges/{exchange_id}/rfq", post(submit_rfq))
        .route("/exchanges/{exchange_id}/order", post(submit_order))
        .route("/exchanges/{exchange_id}/close", post(submit_close));
    if state.issuer.is_some() {
        router = router.route("/vc", get(request_credential));
    }
    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Data<T> {
    data: T,
}

// ---------------------------------------------------------------------------
// Informational
// ---------------------------------------------------------------------------

async fn banner() -> &'static str {
    BANNER
}

async fn did(State(state): State<AppState>) -> String {
    state.pfi.did().to_string()
}

// ---------------------------------------------------------------------------
// Offerings
// ---------------------------------------------------------------------------

async fn list_offerings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let offerings = state.pfi.offerings().await?;
    Ok(Json(Data { data: offerings }))
}

async fn get_offering(
    State(state): State<AppState>,
    Path(offering_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pfi.offering(&OfferingId::new(offering_id)).await?))
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

async fn submit_rfq(
    State(state): State<AppState>,
    Path(exchange_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let rfq = parse_message(&exchange_id, &body)?;
    let quote = state.pfi.handle_rfq(rfq).await?;
    Ok((StatusCode::ACCEPTED, Json(quote)))
}

async fn submit_order(
    State(state): State<AppState>,
    Path(exchange_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let order = parse_message(&exchange_id, &body)?;
    let exchange_id = order.exchange_id();
    state.pfi.handle_order(order).await?;

    let pfi = Arc::clone(&state.pfi);
    tokio::spawn(async move {
        if let Err(e) = pfi.fulfil(exchange_id).await {
            tracing::error!(
                pfi = %pfi.name(),
                exchange_id = %exchange_id,
                code = e.code(),
                error = %e,
                "fulfilment stopped"
            );
        }
    });
    Ok(StatusCode::ACCEPTED)
}

async fn submit_close(
    State(state): State<AppState>,
    Path(exchange_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let close = parse_message(&exchange_id, &body)?;
    state.pfi.handle_close(close).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn get_exchange(
    State(state): State<AppState>,
    Path(exchange_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let exchange = state.pfi.get_exchange(parse_exchange_id(&exchange_id)?).await?;
    Ok(Json(Data {
        data: exchange.into_messages(),
    }))
}

#[derive(Debug, Deserialize)]
struct ExchangesQuery {
    did: String,
}

async fn list_exchanges(
    State(state): State<AppState>,
    Query(query): Query<ExchangesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = Did::parse(query.did)?;
    let exchanges = state.pfi.exchanges_for(&customer).await?;
    Ok(Json(Data {
        data: exchanges
            .into_iter()
            .map(pfi_exchange::Exchange::into_messages)
            .collect::<Vec<_>>(),
    }))
}

fn parse_exchange_id(raw: &str) -> Result<ExchangeId, PfiError> {
    raw.parse::<ExchangeId>()
        .map_err(|_| PfiError::MalformedMessage {
            reason: format!("invalid exchange id {raw:?}"),
        })
}

/// Decode a message body and check it belongs to the exchange in the path.
fn parse_message(path_id: &str, body: &[u8]) -> Result<ProtocolMessage, PfiError> {
    let exchange_id = parse_exchange_id(path_id)?;
    let message: ProtocolMessage =
        serde_json::from_slice(body).map_err(|e| PfiError::MalformedMessage {
            reason: e.to_string(),
        })?;
    if message.exchange_id() != exchange_id {
        return Err(PfiError::MalformedMessage {
            reason: format!(
                "message exchange id {} does not match path {exchange_id}",
                message.exchange_id()
            ),
        });
    }
    Ok(message)
}

// ---------------------------------------------------------------------------
// Credential issuer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CredentialRequest {
    name: String,
    #[serde(default)]
    country: String,
    did: String,
}

#[derive(Debug, Serialize)]
struct Refusal {
    issued: bool,
    reason: String,
}

async fn request_credential(
    State(state): State<AppState>,
    Query(request): Query<CredentialRequest>,
) -> Result<Response, ApiError> {
    let Some(issuer) = state.issuer.as_ref() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let subject = Did::parse(request.did)?;
    let outcome = issuer.issue(&request.name, &request.country, subject.as_str())?;
    Ok(match outcome {
        IssuanceOutcome::Issued(vc) => Json(*vc).into_response(),
        IssuanceOutcome::Refused(reason) => {
            let status = match reason {
                RefusalReason::SanctionsMatch => StatusCode::FORBIDDEN,
                RefusalReason::ScreeningUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            };
            let body = Refusal {
                issued: false,
                reason: reason.to_string(),
            };
            (status, Json(body)).into_response()
        }
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A [`PfiError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(PfiError);

impl From<PfiError> for ApiError {
    fn from(error: PfiError) -> Self {
        Self(error)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// HTTP status for `error`.
#[must_use]
pub fn status_for(error: &PfiError) -> StatusCode {
    match error {
        PfiError::OfferingNotFound(_) | PfiError::ExchangeNotFound(_) => StatusCode::NOT_FOUND,
        PfiError::ExchangeConflict { .. }
        | PfiError::ExchangeClosed(_)
        | PfiError::QuoteExpired(_) => StatusCode::CONFLICT,
        PfiError::CounterpartyNotAllowed(_) => StatusCode::FORBIDDEN,
        other => match other.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Signature => StatusCode::UNAUTHORIZED,
            ErrorCategory::Compliance | ErrorCategory::Dependency => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "request rejected");
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
