use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Verifies the field-concatenation signature carried by one-time payment
/// notifications. The provider signs a pipe-joined canonical string of the
/// notification's fields with a shared HMAC-SHA256 secret.
///
/// Pure computation; no clock, no I/O. A malformed or absent signature is
/// just `false`, never an error.
pub struct FieldSignature {
    secret: Vec<u8>,
}

impl FieldSignature {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn signing_payload(
        merchant_id: &str,
        order_id: &str,
        amount: i64,
        currency: &str,
        status: &str,
    ) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            merchant_id, order_id, amount, currency, status
        )
    }

    /// Produce the hex signature the provider would send. Used by tests and
    /// local tooling; the service itself only verifies.
    pub fn sign(
        &self,
        merchant_id: &str,
        order_id: &str,
        amount: i64,
        currency: &str,
        status: &str,
    ) -> String {
        let payload = Self::signing_payload(merchant_id, order_id, amount, currency, status);
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(
        &self,
        merchant_id: &str,
        order_id: &str,
        amount: i64,
        currency: &str,
        status: &str,
        signature_hex: &str,
    ) -> bool {
        if merchant_id.is_empty() || order_id.is_empty() || signature_hex.is_empty() {
            return false;
        }
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };

        let payload = Self::signing_payload(merchant_id, order_id, amount, currency, status);
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(payload.as_bytes());
        // verify_slice is constant-time.
        mac.verify_slice(&signature).is_ok()
    }
}

impl fmt::Debug for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSignature")
            .field("secret", &"***")
            .finish()
    }
}

/// Verifies the timestamped whole-body signature carried by subscription
/// webhooks. The header has the form `t=<unix seconds>,v1=<hex>` where the
/// hex digest is HMAC-SHA256 over `"{t}.{body}"`. Timestamps outside the
/// configured tolerance are rejected to bound replay windows.
pub struct BodySignature {
    secret: Vec<u8>,
    tolerance_secs: u64,
}

impl BodySignature {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Produce a header valid at time `timestamp`. Used by tests and local
    /// tooling.
    pub fn sign_at(&self, body: &str, timestamp: u64) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &str, header: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.verify_at(body, header, now)
    }

    fn verify_at(&self, body: &str, header: &str, now: u64) -> bool {
        let mut timestamp: Option<u64> = None;
        let mut signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signature = hex::decode(value).ok(),
                _ => {}
            }
        }

        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            return false;
        };

        if now.abs_diff(timestamp) > self.tolerance_secs {
            return false;
        }

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

impl fmt::Debug for BodySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySignature")
            .field("secret", &"***")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}
