//! Wiring: keys, catalogs, stores and routers for every hosted PFI.

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use pfi_compliance::{ComplianceGate, CredentialIssuer, SanctionsRoster};
use pfi_exchange::{ExchangeStore, FileExchangeStore, InMemoryExchangeStore, Pfi};
use pfi_types::{PfiError, PfiInstanceConfig, Result, Signer};

use crate::{
    catalog_data,
    config::ServerConfig,
    http::{self, AppState},
    keys,
};

/// One PFI ready to serve.
pub struct Hosted {
    pub instance: PfiInstanceConfig,
    pub addr: SocketAddr,
    pub pfi: Arc<Pfi>,
    pub router: Router,
}

/// Build every PFI in `config.instances`. The issuer PFI screens against `roster`.
///
/// # Errors
/// Key file, store and signing failures, or a roster without exactly one issuer.
pub async fn assemble(config: &ServerConfig, roster: Arc<SanctionsRoster>) -> Result<Vec<Hosted>> {
    let mut identities = Vec::with_capacity(config.instances.len());
    for instance in &config.instances {
        identities.push(keys::load_or_create(&config.keys_dir, &instance.key_file).await?);
    }

    let mut issuers = config.instances.iter().zip(&identities).filter(|(i, _)| i.issuer);
    let issuer_did = match (issuers.next(), issuers.next()) {
        (Some((_, identity)), None) => identity.did().clone(),
        _ => {
            return Err(PfiError::Configuration(
                "exactly one PFI must act as credential issuer".to_string(),
            ));
        }
    };

    let dids: Vec<_> = identities.iter().map(|i| i.did().clone()).collect();
    let offerings = catalog_data::demo_offerings(&dids, &issuer_did);

    let mut hosted = Vec::with_capacity(config.instances.len());
    for (instance, identity) in config.instances.iter().zip(identities) {
        let catalog = catalog_data::catalog_for(&identity, &offerings)?;
        let store = open_store(config, instance).await?;
        let identity: Arc<dyn Signer> = Arc::new(identity);

        let pfi = Arc::new(
            Pfi::new(
                instance.name.clone(),
                Arc::clone(&identity),
                Arc::new(catalog),
                store,
            )
            .with_settings(config.exchange.clone())
            .with_allowlist(config.allowlist.iter().cloned()),
        );

        let mut state = AppState::new(Arc::clone(&pfi));
        if instance.issuer {
            let gate = ComplianceGate::new(Arc::clone(&roster), config.compliance.match_policy);
            let issuer = CredentialIssuer::new(gate, identity)
                .with_min_score(config.compliance.min_score);
            state = state.with_issuer(Arc::new(issuer));
        }

        tracing::info!(
            pfi = %instance.name,
            did = %pfi.did(),
            port = instance.port,
            issuer = instance.issuer,
            "PFI assembled"
        );
        hosted.push(Hosted {
            instance: instance.clone(),
            addr: SocketAddr::new(config.host, instance.port),
            pfi,
            router: http::router(state),
        });
    }
    Ok(hosted)
}

async fn open_store(
    config: &ServerConfig,
    instance: &PfiInstanceConfig,
) -> Result<Arc<dyn ExchangeStore>> {
    Ok(match &config.data_dir {
        Some(dir) => {
            let subdir = instance.key_file.trim_end_matches(".json");
            Arc::new(FileExchangeStore::open(dir.join(subdir)).await?)
        }
        None => Arc::new(InMemoryExchangeStore::new()),
    })
}
