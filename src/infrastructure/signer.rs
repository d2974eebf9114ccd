//! HMAC-SHA256 request signing used by the inbound API boundary.

use crate::error::{PaymentError, Result};
use hmac::{Hmac, Mac};
use rust_decimal::{Decimal, RoundingStrategy};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies payloads with a shared secret.
#[derive(Clone)]
pub struct TransactionSigner {
    mac: HmacSha256,
}

impl TransactionSigner {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| PaymentError::Config(format!("invalid signing key: {e}")))?;
        Ok(Self { mac })
    }

    /// Hex-encoded HMAC of `data`.
    pub fn sign(&self, data: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, data: &[u8], signature: &str) -> Result<()> {
        let provided = hex::decode(signature).map_err(|_| PaymentError::InvalidSignature)?;
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(&provided).map_err(|_| {
            tracing::warn!("Signature verification failed");
            PaymentError::InvalidSignature
        })
    }

    pub fn sign_transaction(
        &self,
        transaction_id: &str,
        amount: Decimal,
        currency: &str,
        timestamp: i64,
    ) -> String {
        self.sign(canonical_string(transaction_id, amount, currency, timestamp).as_bytes())
    }

    pub fn verify_transaction(
        &self,
        transaction_id: &str,
        amount: Decimal,
        currency: &str,
        timestamp: i64,
        signature: &str,
    ) -> Result<()> {
        self.verify(
            canonical_string(transaction_id, amount, currency, timestamp).as_bytes(),
            signature,
        )
    }
}

/// `id:amount:currency:unix_ts` with the amount fixed to two decimals.
pub fn canonical_string(transaction_id: &str, amount: Decimal, currency: &str, timestamp: i64) -> String {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{transaction_id}:{amount:.2}:{currency}:{timestamp}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_canonical_string_fixes_two_decimals() {
        assert_eq!(
            canonical_string("tx1", dec!(100), "USD", 1_700_000_000),
            "tx1:100.00:USD:1700000000"
        );
        assert_eq!(
            canonical_string("tx1", dec!(10.005), "EUR", 1),
            "tx1:10.01:EUR:1"
        );
    }

    #[test]
    fn test_sign_and_verify_transaction() {
        let signer = TransactionSigner::new(b"secret").unwrap();
        let sig = signer.sign_transaction("tx1", dec!(25.5), "USD", 1_700_000_000);
        assert_eq!(sig.len(), 64);

        signer
            .verify_transaction("tx1", dec!(25.50), "USD", 1_700_000_000, &sig)
            .unwrap();
        assert!(matches!(
            signer.verify_transaction("tx1", dec!(25.51), "USD", 1_700_000_000, &sig),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_and_other_keys() {
        let signer = TransactionSigner::new(b"secret").unwrap();
        let other = TransactionSigner::new(b"other").unwrap();
        let sig = signer.sign(b"payload");

        assert!(signer.verify(b"payload", "not-hex").is_err());
        assert!(other.verify(b"payload", &sig).is_err());
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2.
        let signer = TransactionSigner::new(b"Jefe").unwrap();
        assert_eq!(
            signer.sign(b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
