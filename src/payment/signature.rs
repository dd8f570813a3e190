use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    mac
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as the checkout widget returns it.
pub fn sign(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    hex::encode(
        mac_for(secret, gateway_order_id, gateway_payment_id)
            .finalize()
            .into_bytes(),
    )
}

/// Constant-time check of a client-submitted payment signature.
pub fn verify(secret: &str, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    mac_for(secret, gateway_order_id, gateway_payment_id)
        .verify_slice(&provided)
        .is_ok()
}
