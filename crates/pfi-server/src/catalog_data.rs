//! The hard-coded demo offerings, dealt round-robin across the hosted PFIs.

use chrono::Utc;
use pfi_exchange::InMemoryCatalog;
use pfi_types::{
    Did, Offering, OfferingId, PaymentMethod, PaymentTerms, PresentationDefinition, Result,
    Signer, constants,
};
use rust_decimal::Decimal;

struct Template {
    id: &'static str,
    description: &'static str,
    payin: (&'static str, &'static str),
    payout: (&'static str, &'static str, u64),
    /// Rate as (mantissa, scale).
    rate: (i64, u32),
}

const TEMPLATES: [Template; 10] = [
    Template {
        id: "ghs-to-usdc",
        description: "Exchange your Ghanaian Cedis for USDC",
        payin: ("GHS", "GHS_BANK_TRANSFER"),
        payout: ("USDC", "USDC_WALLET_ADDRESS", 43_200),
        rate: (11, 2),
    },
    Template {
        id: "zar-to-btc",
        description: "Exchange your South African Rand for Bitcoin",
        payin: ("ZAR", "ZAR_BANK_TRANSFER"),
        payout: ("BTC", "BTC_WALLET_ADDRESS", 86_400),
        rate: (19, 6),
    },
    Template {
        id: "usd-to-gbp",
        description: "Exchange your US Dollars for British Pounds",
        payin: ("USD", "USD_BANK_TRANSFER"),
        payout: ("GBP", "GBP_BANK_TRANSFER", 86_400),
        rate: (82, 2),
    },
    Template {
        id: "mad-to-egp",
        description: "Exchange your Moroccan Dirhams for Egyptian Pounds",
        payin: ("MAD", "MAD_BANK_TRANSFER"),
        payout: ("EGP", "EGP_BANK_TRANSFER", 86_400),
        rate: (433, 2),
    },
    Template {
        id: "usd-to-ghs",
        description: "Exchange your US Dollars for Ghanaian Cedis",
        payin: ("USD", "USD_BANK_TRANSFER"),
        payout: ("GHS", "GHS_MOBILE_MONEY", 43_200),
        rate: (74, 1),
    },
    Template {
        id: "ghs-to-kes",
        description: "Exchange your Ghanaian Cedis for Kenyan Shillings",
        payin: ("GHS", "GHS_BANK_TRANSFER"),
        payout: ("KES", "KES_MOBILE_MONEY", 72_000),
        rate: (152, 1),
    },
    Template {
        id: "eur-to-zar",
        description: "Exchange your Euros for South African Rand",
        payin: ("EUR", "EUR_BANK_TRANSFER"),
        payout: ("ZAR", "ZAR_BANK_TRANSFER", 86_400),
        rate: (1785, 2),
    },
    Template {
        id: "gbp-to-cad",
        description: "Exchange your British Pounds for Canadian Dollars",
        payin: ("GBP", "GBP_BANK_TRANSFER"),
        payout: ("CAD", "CAD_BANK_TRANSFER", 86_400),
        rate: (170, 2),
    },
    Template {
        id: "ghs-to-ngn",
        description: "Exchange your Ghanaian Cedis for Nigerian Naira",
        payin: ("GHS", "GHS_BANK_TRANSFER"),
        payout: ("NGN", "NGN_MOBILE_MONEY", 72_000),
        rate: (755, 1),
    },
    Template {
        id: "usd-to-kes",
        description: "Exchange your US Dollars for Kenyan Shillings",
        payin: ("USD", "USD_BANK_TRANSFER"),
        payout: ("KES", "KES_BANK_TRANSFER", 86_400),
        rate: (1205, 1),
    },
];

impl Template {
    fn offering(&self, pfi: Did, issuer: &Did) -> Offering {
        let (payin_currency, payin_kind) = self.payin;
        let (payout_currency, payout_kind, settlement_secs) = self.payout;
        Offering {
            id: OfferingId::new(self.id),
            description: self.description.to_string(),
            pfi,
            payin: PaymentTerms {
                currency_code: payin_currency.to_string(),
                methods: vec![PaymentMethod::new(payin_kind)],
            },
            payout: PaymentTerms {
                currency_code: payout_currency.to_string(),
                methods: vec![PaymentMethod::new(payout_kind).with_settlement_time(settlement_secs)],
            },
            payout_units_per_payin_unit: Decimal::new(self.rate.0, self.rate.1),
            required_claims: Some(PresentationDefinition::single(
                constants::KNOWN_CUSTOMER_CREDENTIAL,
                issuer.clone(),
            )),
            created_at: Utc::now(),
            signature: None,
        }
    }
}

/// Every demo offering, offering `i` published by `pfis[i % pfis.len()]`.
#[must_use]
pub fn demo_offerings(pfis: &[Did], issuer: &Did) -> Vec<Offering> {
    if pfis.is_empty() {
        return Vec::new();
    }
    TEMPLATES
        .iter()
        .enumerate()
        .map(|(i, t)| t.offering(pfis[i % pfis.len()].clone(), issuer))
        .collect()
}

/// The signed catalog of the offerings `signer` publishes.
pub fn catalog_for(signer: &dyn Signer, offerings: &[Offering]) -> Result<InMemoryCatalog> {
    InMemoryCatalog::signed(
        offerings.iter().filter(|o| &o.pfi == signer.did()).cloned(),
        signer,
    )
}

#[cfg(test)]
mod tests {
    use pfi_types::BearerIdentity;

    use super::*;

    #[test]
    fn ten_offerings_dealt_across_five_pfis() {
        let pfis: Vec<_> = (1..=5).map(BearerIdentity::deterministic).collect();
        let dids: Vec<_> = pfis.iter().map(|p| p.did().clone()).collect();
        let issuer = dids[4].clone();
        let offerings = demo_offerings(&dids, &issuer);
        assert_eq!(offerings.len(), 10);

        for pfi in &pfis {
            let catalog = catalog_for(pfi, &offerings).unwrap();
            assert_eq!(catalog.len(), 2);
        }
        assert!(offerings.iter().all(|o| {
            o.required_claims
                .as_ref()
                .is_some_and(|pd| pd.input_descriptors[0].issuer == issuer)
        }));
    }

    #[test]
    fn rates_match_the_published_pairs() {
        let pfi = BearerIdentity::deterministic(1);
        let offerings = demo_offerings(&[pfi.did().clone()], pfi.did());
        let usd_kes = offerings.iter().find(|o| o.pair() == "USD/KES").unwrap();
        assert_eq!(usd_kes.payout_units_per_payin_unit, Decimal::new(1205, 1));
        let zar_btc = offerings.iter().find(|o| o.pair() == "ZAR/BTC").unwrap();
        assert_eq!(zar_btc.payout_units_per_payin_unit.to_string(), "0.000019");
    }

    #[test]
    fn no_pfis_means_no_offerings() {
        let issuer = BearerIdentity::deterministic(9);
        assert!(demo_offerings(&[], issuer.did()).is_empty());
    }
}
