//! Identifier generation. Everything here is alphanumeric because PayTR
//! rejects any other character in `merchant_oid`.

use crate::errors::ServiceError;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

const SESSION_ID_LEN: usize = 24;
const TRANSACTION_ID_LEN: usize = 20;
const BANK_TRANSFER_PREFIX: &str = "BT";
const BANK_TRANSFER_SUFFIX_LEN: usize = 8;
const MAX_REFERENCE_LEN: usize = 64;

fn random_alphanumeric(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn new_session_id() -> String {
    random_alphanumeric(SESSION_ID_LEN)
}

pub fn new_transaction_id() -> String {
    format!("TX{}", random_alphanumeric(TRANSACTION_ID_LEN))
}

/// `BT` followed by eight uppercase letters or digits.
pub fn new_bank_transfer_reference() -> String {
    format!(
        "{}{}",
        BANK_TRANSFER_PREFIX,
        random_alphanumeric(BANK_TRANSFER_SUFFIX_LEN).to_ascii_uppercase()
    )
}

/// Accepts a caller-supplied session id verbatim if it is usable as a reference.
pub fn validate_reference(reference: &str) -> Result<(), ServiceError> {
    if reference.is_empty() || reference.len() > MAX_REFERENCE_LEN {
        return Err(ServiceError::ValidationError(format!(
            "sessionId must be 1 to {} characters",
            MAX_REFERENCE_LEN
        )));
    }
    if !reference.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::ValidationError(
            "sessionId may only contain letters and digits".to_string(),
        ));
    }
    Ok(())
}
