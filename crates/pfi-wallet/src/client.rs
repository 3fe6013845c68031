//! HTTP client for one PFI.
//!
//! Every response from the PFI is checked before it is handed back:
//! offerings and quotes must carry a valid signature from the PFI, and
//! credentials from the issuer must verify. Offerings that fail are
//! dropped with a warning; a quote that fails is an error.
//!
//! Non-2xx responses become [`PfiError::Transport`] carrying the status
//! and the server's `PFI_ERR_nnn` code when one was sent.

use pfi_types::{
    Credential, Did, ExchangeId, MessageKind, Offering, PfiError, ProtocolMessage, Result,
};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::AllowlistEntry;

#[derive(Debug, Deserialize)]
struct Data<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

fn transport(e: reqwest::Error) -> PfiError {
    PfiError::Transport {
        reason: e.to_string(),
    }
}

/// Client for one PFI's HTTP surface.
#[derive(Debug, Clone)]
pub struct PfiClient {
    http: reqwest::Client,
    base_url: String,
}

impl PfiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Share one connection pool across several PFIs.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn for_entry(entry: &AllowlistEntry) -> Self {
        Self::new(entry.endpoint.clone())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// The DID this PFI signs with.
    pub async fn did(&self) -> Result<Did> {
        let response = self.http.get(self.url("/did")).send().await.map_err(transport)?;
        let text = checked(response).await?.text().await.map_err(transport)?;
        Did::parse(text.trim())
    }

    /// Published offerings whose signatures verify.
    pub async fn offerings(&self) -> Result<Vec<Offering>> {
        let response = self
            .http
            .get(self.url("/offerings"))
            .send()
            .await
            .map_err(transport)?;
        let Data { data } = json::<Data<Vec<Offering>>>(response).await?;
        let total = data.len();
        let verified: Vec<Offering> = data.into_iter().filter(Offering::verify).collect();
        if verified.len() < total {
            tracing::warn!(
                pfi = %self.base_url,
                dropped = total - verified.len(),
                "offerings with invalid signatures ignored"
            );
        }
        Ok(verified)
    }

    /// Submit an RFQ and return the PFI's signed quote.
    ///
    /// # Errors
    /// [`PfiError::UnexpectedKind`] if the reply is not a quote, signature
    /// errors if it does not verify against the RFQ's recipient.
    pub async fn create_exchange(&self, rfq: &ProtocolMessage) -> Result<ProtocolMessage> {
        let response = self
            .http
            .post(self.url(&format!("/exchanges/{}/rfq", rfq.exchange_id())))
            .json(rfq)
            .send()
            .await
            .map_err(transport)?;
        let quote: ProtocolMessage = json(response).await?;

        if quote.kind() != MessageKind::Quote {
            return Err(PfiError::UnexpectedKind {
                expected: MessageKind::Quote,
                actual: quote.kind(),
            });
        }
        if quote.sender() != rfq.recipient() {
            return Err(PfiError::SignerMismatch {
                signer: quote.sender().clone(),
                sender: rfq.recipient().clone(),
            });
        }
        quote.check_signature()?;
        tracing::debug!(exchange_id = %quote.exchange_id(), "quote received");
        Ok(quote)
    }

    /// Submit an Order. Fulfilment continues on the PFI after this returns.
    pub async fn submit_order(&self, order: &ProtocolMessage) -> Result<()> {
        self.submit(order, "order").await
    }

    pub async fn submit_close(&self, close: &ProtocolMessage) -> Result<()> {
        self.submit(close, "close").await
    }

    async fn submit(&self, message: &ProtocolMessage, endpoint: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/exchanges/{}/{endpoint}", message.exchange_id())))
            .json(message)
            .send()
            .await
            .map_err(transport)?;
        checked(response).await?;
        Ok(())
    }

    /// Every message of one exchange, oldest first.
    pub async fn get_exchange(&self, exchange_id: ExchangeId) -> Result<Vec<ProtocolMessage>> {
        let response = self
            .http
            .get(self.url(&format!("/exchanges/{exchange_id}")))
            .send()
            .await
            .map_err(transport)?;
        Ok(json::<Data<Vec<ProtocolMessage>>>(response).await?.data)
    }

    /// Every exchange `customer` has with this PFI.
    pub async fn exchanges(&self, customer: &Did) -> Result<Vec<Vec<ProtocolMessage>>> {
        let response = self
            .http
            .get(self.url("/exchanges"))
            .query(&[("did", customer.as_str())])
            .send()
            .await
            .map_err(transport)?;
        Ok(json::<Data<Vec<Vec<ProtocolMessage>>>>(response).await?.data)
    }

    /// Ask the issuer PFI for a known-customer credential.
    ///
    /// Returns `Ok(None)` when the issuer refuses on a sanctions match.
    pub async fn request_credential(
        &self,
        name: &str,
        country: &str,
        subject: &Did,
    ) -> Result<Option<Credential>> {
        let response = self
            .http
            .get(self.url("/vc"))
            .query(&[("name", name), ("country", country), ("did", subject.as_str())])
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::FORBIDDEN {
            tracing::info!(subject = %subject.short(), "credential refused by issuer");
            return Ok(None);
        }

        let credential: Credential = json(response).await?;
        if !credential.verify() {
            return Err(PfiError::SignatureInvalid {
                reason: format!("credential {} does not verify", credential.id),
            });
        }
        Ok(Some(credential))
    }
}

async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.map_err(transport)?;
    let reason = match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(ErrorBody { code, message }) => format!("{status}: {code}: {message}"),
        Err(_) => format!("{status}: {}", String::from_utf8_lossy(&body)),
    };
    Err(PfiError::Transport { reason })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = checked(response).await?.bytes().await.map_err(transport)?;
    Ok(serde_json::from_slice(&body)?)
}
