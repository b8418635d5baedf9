//! PayTR field orderings. Every PayTR hash is base64 HMAC-SHA256 keyed by the
//! merchant key; the merchant salt is one of the concatenated values.

use super::{sign, verify, SignedFields};
use crate::errors::ServiceError;

/// Inputs of the iFrame token hash, in the order PayTR concatenates them.
#[derive(Debug, Clone)]
pub struct TokenSignature<'a> {
    pub merchant_id: &'a str,
    pub user_ip: &'a str,
    pub merchant_oid: &'a str,
    pub email: &'a str,
    /// Minor units
    pub payment_amount: i64,
    /// Base64 basket
    pub user_basket: &'a str,
    pub no_installment: bool,
    pub max_installment: u8,
    pub currency: &'a str,
    pub test_mode: bool,
}

pub(crate) fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl TokenSignature<'_> {
    pub fn fields(&self, merchant_salt: &str) -> SignedFields {
        SignedFields::new()
            .with("merchant_id", self.merchant_id)
            .with("user_ip", self.user_ip)
            .with("merchant_oid", self.merchant_oid)
            .with("email", self.email)
            .with("payment_amount", self.payment_amount)
            .with("user_basket", self.user_basket)
            .with("no_installment", flag(self.no_installment))
            .with("max_installment", self.max_installment)
            .with("currency", self.currency)
            .with("test_mode", flag(self.test_mode))
            .with("merchant_salt", merchant_salt)
    }
}

pub fn callback_fields(
    merchant_oid: &str,
    merchant_salt: &str,
    status: &str,
    total_amount: &str,
) -> SignedFields {
    SignedFields::new()
        .with("merchant_oid", merchant_oid)
        .with("merchant_salt", merchant_salt)
        .with("status", status)
        .with("total_amount", total_amount)
}

pub fn status_query_fields(merchant_id: &str, merchant_oid: &str, merchant_salt: &str) -> SignedFields {
    SignedFields::new()
        .with("merchant_id", merchant_id)
        .with("merchant_oid", merchant_oid)
        .with("merchant_salt", merchant_salt)
}

pub fn refund_fields(
    merchant_id: &str,
    merchant_oid: &str,
    return_amount: &str,
    merchant_salt: &str,
) -> SignedFields {
    SignedFields::new()
        .with("merchant_id", merchant_id)
        .with("merchant_oid", merchant_oid)
        .with("return_amount", return_amount)
        .with("merchant_salt", merchant_salt)
}

/// Holds the merchant key and salt. Both are optional so that a half-configured
/// deployment fails at use instead of at startup.
#[derive(Clone, Default)]
pub struct PaytrSigner {
    merchant_key: Option<String>,
    merchant_salt: Option<String>,
}

impl std::fmt::Debug for PaytrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaytrSigner")
            .field("merchant_key", &self.merchant_key.as_ref().map(|_| "***"))
            .field("merchant_salt", &self.merchant_salt.as_ref().map(|_| "***"))
            .finish()
    }
}

impl PaytrSigner {
    pub fn new(merchant_key: Option<String>, merchant_salt: Option<String>) -> Self {
        Self {
            merchant_key: merchant_key.filter(|s| !s.is_empty()),
            merchant_salt: merchant_salt.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.merchant_key.is_some() && self.merchant_salt.is_some()
    }

    fn secrets(&self) -> Result<(&str, &str), ServiceError> {
        match (self.merchant_key.as_deref(), self.merchant_salt.as_deref()) {
            (Some(key), Some(salt)) => Ok((key, salt)),
            _ => Err(ServiceError::ConfigurationError(
                "PayTR merchant key or salt is not set".to_string(),
            )),
        }
    }

    pub fn sign_token(&self, token: &TokenSignature<'_>) -> Result<String, ServiceError> {
        let (key, salt) = self.secrets()?;
        sign(&token.fields(salt), key)
    }

    pub fn verify_token(&self, token: &TokenSignature<'_>, signature: &str) -> bool {
        match self.secrets() {
            Ok((key, salt)) => verify(&token.fields(salt), Some(key), signature),
            Err(_) => false,
        }
    }

    pub fn sign_callback(
        &self,
        merchant_oid: &str,
        status: &str,
        total_amount: &str,
    ) -> Result<String, ServiceError> {
        let (key, salt) = self.secrets()?;
        sign(&callback_fields(merchant_oid, salt, status, total_amount), key)
    }

    /// False whenever key or salt is missing.
    pub fn verify_callback(
        &self,
        merchant_oid: &str,
        status: &str,
        total_amount: &str,
        hash: &str,
    ) -> bool {
        match self.secrets() {
            Ok((key, salt)) => verify(
                &callback_fields(merchant_oid, salt, status, total_amount),
                Some(key),
                hash,
            ),
            Err(_) => false,
        }
    }

    pub fn sign_status_query(
        &self,
        merchant_id: &str,
        merchant_oid: &str,
    ) -> Result<String, ServiceError> {
        let (key, salt) = self.secrets()?;
        sign(&status_query_fields(merchant_id, merchant_oid, salt), key)
    }

    pub fn sign_refund(
        &self,
        merchant_id: &str,
        merchant_oid: &str,
        return_amount: &str,
    ) -> Result<String, ServiceError> {
        let (key, salt) = self.secrets()?;
        sign(&refund_fields(merchant_id, merchant_oid, return_amount, salt), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signer() -> PaytrSigner {
        PaytrSigner::new(Some("merchant-key".into()), Some("merchant-salt".into()))
    }

    fn token<'a>(basket: &'a str) -> TokenSignature<'a> {
        TokenSignature {
            merchant_id: "123456",
            user_ip: "85.34.78.112",
            merchant_oid: "ABC123",
            email: "ayse@example.com",
            payment_amount: 15000,
            user_basket: basket,
            no_installment: false,
            max_installment: 0,
            currency: "TL",
            test_mode: true,
        }
    }

    #[test]
    fn token_canonical_order_includes_minor_amount_and_salt() {
        let fields = token("W1siQSIsIjc1LjAwIiwyXV0=").fields("merchant-salt");
        assert_eq!(
            fields.canonical(),
            "12345685.34.78.112ABC123ayse@example.com15000W1siQSIsIjc1LjAwIiwyXV0=00TL1merchant-salt"
        );
        assert_eq!(fields.keys().last(), Some("merchant_salt"));
    }

    #[test]
    fn token_signature_round_trip() {
        let signer = signer();
        let t = token("basket");
        let signature = signer.sign_token(&t).unwrap();
        assert!(signer.verify_token(&t, &signature));

        let other = TokenSignature {
            payment_amount: 14999,
            ..t.clone()
        };
        assert!(!signer.verify_token(&other, &signature));
    }

    #[test]
    fn callback_order_is_oid_salt_status_amount() {
        assert_eq!(
            callback_fields("ABC123", "salt", "success", "15000").canonical(),
            "ABC123saltsuccess15000"
        );
    }

    #[test]
    fn status_and_refund_orderings() {
        assert_eq!(
            status_query_fields("123456", "ABC123", "salt").canonical(),
            "123456ABC123salt"
        );
        assert_eq!(
            refund_fields("123456", "ABC123", "150.00", "salt").canonical(),
            "123456ABC123150.00salt"
        );
    }

    #[test]
    fn callback_verification_rejects_tampering() {
        let signer = signer();
        let hash = signer.sign_callback("ABC123", "success", "15000").unwrap();
        assert!(signer.verify_callback("ABC123", "success", "15000", &hash));
        assert!(!signer.verify_callback("ABC123", "success", "14999", &hash));
        assert!(!signer.verify_callback("ABC124", "success", "15000", &hash));
        assert!(!signer.verify_callback("ABC123", "failed", "15000", &hash));
    }

    #[test]
    fn unconfigured_signer_fails_closed() {
        let configured = signer();
        let hash = configured.sign_callback("ABC123", "success", "15000").unwrap();

        let missing_salt = PaytrSigner::new(Some("merchant-key".into()), None);
        assert!(!missing_salt.is_configured());
        assert!(!missing_salt.verify_callback("ABC123", "success", "15000", &hash));
        assert!(matches!(
            missing_salt.sign_callback("ABC123", "success", "15000"),
            Err(ServiceError::ConfigurationError(_))
        ));

        let empty_key = PaytrSigner::new(Some(String::new()), Some("merchant-salt".into()));
        assert!(!empty_key.is_configured());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("merchant-key"));
        assert!(!rendered.contains("merchant-salt"));
    }

    proptest! {
        #[test]
        fn mutated_callback_field_never_verifies(
            oid in "[A-Za-z0-9]{1,20}",
            amount in 1u32..10_000_000,
            field in 0usize..3,
        ) {
            let signer = signer();
            let total = amount.to_string();
            let hash = signer.sign_callback(&oid, "success", &total).unwrap();
            prop_assert!(signer.verify_callback(&oid, "success", &total, &hash));

            let (oid2, status2, total2) = match field {
                0 => (format!("{}Z", &oid[..oid.len() - 1]), "success".to_string(), total.clone()),
                1 => (oid.clone(), "Success".to_string(), total.clone()),
                _ => (oid.clone(), "success".to_string(), (amount + 1).to_string()),
            };
            prop_assume!(oid2 != oid || status2 != "success" || total2 != total);
            prop_assert!(!signer.verify_callback(&oid2, &status2, &total2, &hash));
        }
    }
}
