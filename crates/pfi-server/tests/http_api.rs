//! HTTP surface driven in-process through `tower::ServiceExt::oneshot`.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use pfi_compliance::{ComplianceGate, CredentialIssuer, SanctionsRoster};
use pfi_exchange::{InMemoryCatalog, InMemoryExchangeStore, Pfi};
use pfi_server::{AppState, router};
use pfi_types::{
    BearerIdentity, Credential, MatchPolicy, MessageData, Offering, OfferingId, OrderData,
    ProtocolMessage, RfqData, SanctionsEntry, SelectedPayin, SelectedPayout, Signer,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

struct Harness {
    app: Router,
    plain: Router,
    pfi: BearerIdentity,
    customer: BearerIdentity,
}

fn harness() -> Harness {
    let pfi = BearerIdentity::deterministic(30);
    let customer = BearerIdentity::deterministic(31);
    let catalog = InMemoryCatalog::signed(
        [Offering::sample(pfi.did().clone(), pfi.did().clone())],
        &pfi,
    )
    .unwrap();
    let handler = Arc::new(Pfi::new(
        "Titanium Trust",
        Arc::new(pfi.clone()),
        Arc::new(catalog),
        Arc::new(InMemoryExchangeStore::new()),
    ));

    let roster = Arc::new(SanctionsRoster::preloaded(vec![SanctionsEntry::new(
        "John Doe",
        "Nowhereland",
    )]));
    let issuer = CredentialIssuer::new(
        ComplianceGate::new(roster, MatchPolicy::Either),
        Arc::new(pfi.clone()),
    );

    Harness {
        app: router(AppState::new(Arc::clone(&handler)).with_issuer(Arc::new(issuer))),
        plain: router(AppState::new(handler)),
        pfi,
        customer,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, uri: &str, message: &ProtocolMessage) -> (StatusCode, Vec<u8>) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(message).unwrap()))
        .unwrap();
    call(app, request).await
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

impl Harness {
    async fn credential(&self) -> Credential {
        let uri = format!(
            "/vc?name=Jane%20Roe&country=Ruritania&did={}",
            self.customer.did()
        );
        let (status, body) = get(&self.app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    fn rfq(&self, claims: Vec<Credential>) -> ProtocolMessage {
        ProtocolMessage::rfq(
            self.customer.did().clone(),
            self.pfi.did().clone(),
            RfqData {
                offering_id: OfferingId::new("usd-to-kes"),
                payin: SelectedPayin {
                    amount: Decimal::new(10, 0),
                    kind: "USD_BANK_TRANSFER".into(),
                    payment_details: BTreeMap::new(),
                },
                payout: SelectedPayout {
                    kind: "KES_BANK_TRANSFER".into(),
                    payment_details: BTreeMap::new(),
                },
                claims,
            },
        )
        .signed(&self.customer)
        .unwrap()
    }

    fn order(&self, rfq: &ProtocolMessage) -> ProtocolMessage {
        ProtocolMessage::new(
            self.customer.did().clone(),
            self.pfi.did().clone(),
            rfq.exchange_id(),
            MessageData::Order(OrderData {}),
        )
        .signed(&self.customer)
        .unwrap()
    }
}

#[tokio::test]
async fn informational_endpoints() {
    let h = harness();
    let (status, body) = get(&h.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("tbdex"));

    let (status, body) = get(&h.app, "/did").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), h.pfi.did().to_string());
}

#[tokio::test]
async fn offerings_are_listed_and_fetched() {
    let h = harness();
    let (status, body) = get(&h.app, "/offerings").await;
    assert_eq!(status, StatusCode::OK);
    let offerings: Vec<Offering> = serde_json::from_value(json(&body)["data"].clone()).unwrap();
    assert_eq!(offerings.len(), 1);
    assert!(offerings[0].verify());

    let (status, _) = get(&h.app, "/offerings/usd-to-kes").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&h.app, "/offerings/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "PFI_ERR_101");
}

#[tokio::test]
async fn rfq_is_answered_with_a_quote() {
    let h = harness();
    let rfq = h.rfq(vec![h.credential().await]);
    let uri = format!("/exchanges/{}/rfq", rfq.exchange_id());

    let (status, body) = post(&h.app, &uri, &rfq).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let quote: ProtocolMessage = serde_json::from_slice(&body).unwrap();
    assert!(quote.verify());
    assert_eq!(quote.as_quote().unwrap().payout.amount, Decimal::new(1205, 0));

    let (status, body) = get(&h.app, &format!("/exchanges/{}", rfq.exchange_id())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"].as_array().unwrap().len(), 2);

    let (status, body) = get(&h.app, &format!("/exchanges?did={}", h.customer.did())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bare_exchange_post_is_an_rfq() {
    let h = harness();
    let rfq = h.rfq(vec![h.credential().await]);
    let (status, _) = post(&h.app, &format!("/exchanges/{}", rfq.exchange_id()), &rfq).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn rejected_rfqs_map_to_status_codes() {
    let h = harness();

    let ineligible = h.rfq(Vec::new());
    let (status, body) = post(
        &h.app,
        &format!("/exchanges/{}/rfq", ineligible.exchange_id()),
        &ineligible,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "PFI_ERR_102");

    let mut tampered = h.rfq(vec![h.credential().await]);
    if let MessageData::Rfq(data) = &mut tampered.data {
        data.payin.amount = Decimal::new(99_999, 0);
    }
    let (status, _) = post(
        &h.app,
        &format!("/exchanges/{}/rfq", tampered.exchange_id()),
        &tampered,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut unlisted = h.rfq(vec![h.credential().await]);
    if let MessageData::Rfq(data) = &mut unlisted.data {
        data.offering_id = OfferingId::new("eur-to-ngn");
    }
    let unlisted = unlisted.signed(&h.customer).unwrap();
    let (status, body) = post(
        &h.app,
        &format!("/exchanges/{}/rfq", unlisted.exchange_id()),
        &unlisted,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "PFI_ERR_101");

    let request = Request::post(format!("/exchanges/{}/rfq", tampered.exchange_id()))
        .header("content-type", "application/json")
        .body(Body::from("{\"metadata\":"))
        .unwrap();
    let (status, body) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "PFI_ERR_100");
}

#[tokio::test]
async fn order_is_fulfilled_in_the_background() {
    let h = harness();
    let rfq = h.rfq(vec![h.credential().await]);
    let id = rfq.exchange_id();
    post(&h.app, &format!("/exchanges/{id}/rfq"), &rfq).await;

    let (status, _) = post(&h.app, &format!("/exchanges/{id}/order"), &h.order(&rfq)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut messages = Vec::new();
    for _ in 0..100 {
        let (_, body) = get(&h.app, &format!("/exchanges/{id}")).await;
        messages = json(&body)["data"].as_array().unwrap().clone();
        if messages.len() == 7 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(messages.len(), 7);
    assert_eq!(messages[6]["metadata"]["kind"], "close");
    assert_eq!(messages[6]["data"]["success"], true);

    let (status, _) = post(&h.app, &format!("/exchanges/{id}/order"), &h.order(&rfq)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_exchange_is_not_found() {
    let h = harness();
    let rfq = h.rfq(Vec::new());
    let (status, _) = post(
        &h.app,
        &format!("/exchanges/{}/order", rfq.exchange_id()),
        &h.order(&rfq),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credential_endpoint_refuses_sanctioned_names() {
    let h = harness();
    let uri = format!(
        "/vc?name=John%20Doe&country=Nowhereland&did={}",
        h.customer.did()
    );
    let (status, body) = get(&h.app, &uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["issued"], false);

    let vc = h.credential().await;
    assert!(vc.verify());
    assert_eq!(&vc.issuer, h.pfi.did());
}

#[tokio::test]
async fn credential_endpoint_only_on_the_issuer() {
    let h = harness();
    let uri = format!("/vc?name=Jane%20Roe&did={}", h.customer.did());
    let (status, _) = get(&h.plain, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
