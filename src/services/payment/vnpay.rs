use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use super::{CheckoutOrder, GatewayError, PaymentGateway, ProviderCallback};
use crate::config::{VnpayConfig, MERCHANT_UTC_OFFSET_HOURS};

type HmacSha512 = Hmac<Sha512>;

pub const MAX_AMOUNT: i64 = 999_999_999;
pub const HOTEL_ORDER_TYPE: &str = "170003";

const VERSION: &str = "2.1.0";
const SUCCESS_CODE: &str = "00";
const HASH_TYPE: &str = "HMACSHA512";
const CHECKOUT_TTL_MINUTES: i64 = 15;

pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    fn mac_over(&self, params: &BTreeMap<&str, String>) -> Result<HmacSha512, GatewayError> {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|_| GatewayError::Signing)?;
        mac.update(canonical_query(params).as_bytes());
        Ok(mac)
    }

    /// Uppercase hex HMAC-SHA512 of the canonical query built from `params`.
    pub fn sign(&self, params: &BTreeMap<&str, String>) -> Result<String, GatewayError> {
        let mac = self.mac_over(params)?;
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }

    fn verify(&self, params: &BTreeMap<&str, String>, signature: &str) -> bool {
        let expected = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        match self.mac_over(params) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

/// `k=v` pairs sorted by key, values percent-encoded with spaces as `%20`.
fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn provider_timestamp(at: DateTime<Utc>) -> String {
    (at + Duration::hours(MERCHANT_UTC_OFFSET_HOURS))
        .format("%Y%m%d%H%M%S")
        .to_string()
}

pub(crate) fn normalize_client_ip(raw: &str) -> Result<String, GatewayError> {
    let ip = raw.trim();
    if ip.is_empty() {
        return Err(GatewayError::MissingClientIp);
    }
    match ip.parse::<IpAddr>() {
        Ok(addr) if addr.is_loopback() && addr.is_ipv6() => Ok("127.0.0.1".to_string()),
        Ok(addr) => Ok(addr.to_string()),
        Err(_) => Err(GatewayError::InvalidClientIp(ip.to_string())),
    }
}

impl PaymentGateway for VnpayGateway {
    fn method(&self) -> &'static str {
        "vnpay"
    }

    fn checkout_url(&self, order: &CheckoutOrder<'_>) -> Result<String, GatewayError> {
        if order.amount <= 0 {
            return Err(GatewayError::InvalidAmount(order.amount));
        }
        if order.amount > MAX_AMOUNT {
            return Err(GatewayError::AmountExceedsLimit(order.amount));
        }
        let client_ip = normalize_client_ip(order.client_ip)?;

        let expires_at = order.created_at + Duration::minutes(CHECKOUT_TTL_MINUTES);
        let params: BTreeMap<&str, String> = BTreeMap::from([
            ("vnp_Version", VERSION.to_string()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", (order.amount * 100).to_string()),
            ("vnp_CurrCode", "VND".to_string()),
            ("vnp_TxnRef", order.txn_ref.to_string()),
            (
                "vnp_OrderInfo",
                format!("Thanh toan dat phong {}", order.booking_id),
            ),
            ("vnp_OrderType", order.order_type.to_string()),
            ("vnp_Locale", "vn".to_string()),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_IpAddr", client_ip),
            ("vnp_CreateDate", provider_timestamp(order.created_at)),
            ("vnp_ExpireDate", provider_timestamp(expires_at)),
        ]);

        let signature = self.sign(&params)?;
        Ok(format!(
            "{}?{}&vnp_SecureHashType={HASH_TYPE}&vnp_SecureHash={signature}",
            self.config.url,
            canonical_query(&params)
        ))
    }

    fn parse_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<ProviderCallback, GatewayError> {
        let signature = params
            .get("vnp_SecureHash")
            .ok_or(GatewayError::InvalidSignature)?;

        let signed: BTreeMap<&str, String> = params
            .iter()
            .filter(|(k, _)| {
                k.starts_with("vnp_")
                    && k.as_str() != "vnp_SecureHash"
                    && k.as_str() != "vnp_SecureHashType"
            })
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();

        if !self.verify(&signed, signature) {
            return Err(GatewayError::InvalidSignature);
        }

        let required = |key: &'static str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(GatewayError::MissingCallbackParam(key))
        };

        Ok(ProviderCallback {
            txn_ref: required("vnp_TxnRef")?,
            response_code: required("vnp_ResponseCode")?,
            transaction_no: required("vnp_TransactionNo")?,
        })
    }

    fn is_success(&self, callback: &ProviderCallback) -> bool {
        callback.response_code == SUCCESS_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "HOTEL01".into(),
            hash_secret: "SECRETKEY".into(),
            url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:3000/payments/vnpay_return".into(),
        })
    }

    fn order(amount: i64, ip: &str) -> CheckoutOrder<'_> {
        CheckoutOrder {
            txn_ref: "7-abc",
            booking_id: 7,
            amount,
            client_ip: ip,
            order_type: HOTEL_ORDER_TYPE,
            created_at: Utc.with_ymd_and_hms(2030, 5, 1, 3, 0, 0).unwrap(),
        }
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap();
                (k.to_string(), urlencoding::decode(v).unwrap().into_owned())
            })
            .collect()
    }

    #[test]
    fn test_checkout_url_is_signed_and_sorted() {
        let gw = gateway();
        let url = gw.checkout_url(&order(1_500_000, "10.0.0.5")).unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

        let pairs = query_pairs(&url);
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        let signed_keys = &keys[..keys.len() - 2];
        let mut sorted = signed_keys.to_vec();
        sorted.sort();
        assert_eq!(signed_keys, sorted.as_slice());
        assert_eq!(keys[keys.len() - 2], "vnp_SecureHashType");
        assert_eq!(keys[keys.len() - 1], "vnp_SecureHash");

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("vnp_Amount"), "150000000");
        assert_eq!(get("vnp_TxnRef"), "7-abc");
        assert_eq!(get("vnp_OrderType"), "170003");
        assert_eq!(get("vnp_CreateDate"), "20300501100000");
        assert_eq!(get("vnp_ExpireDate"), "20300501101500");

        let callback: HashMap<String, String> = pairs.into_iter().collect();
        let signed: BTreeMap<&str, String> = callback
            .iter()
            .filter(|(k, _)| !k.starts_with("vnp_SecureHash"))
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        assert_eq!(gw.sign(&signed).unwrap(), callback["vnp_SecureHash"]);
    }

    #[test]
    fn test_spaces_encode_as_percent_20() {
        let url = gateway().checkout_url(&order(10, "10.0.0.5")).unwrap();
        assert!(url.contains("vnp_OrderInfo=Thanh%20toan%20dat%20phong%207"));
        assert!(!url.contains('+'));
    }

    #[test]
    fn test_amount_bounds() {
        let gw = gateway();
        assert!(matches!(
            gw.checkout_url(&order(0, "10.0.0.5")),
            Err(GatewayError::InvalidAmount(0))
        ));
        assert!(matches!(
            gw.checkout_url(&order(MAX_AMOUNT + 1, "10.0.0.5")),
            Err(GatewayError::AmountExceedsLimit(_))
        ));
        assert!(gw.checkout_url(&order(MAX_AMOUNT, "10.0.0.5")).is_ok());
    }

    #[test]
    fn test_client_ip_normalization() {
        assert_eq!(normalize_client_ip(" ::1 ").unwrap(), "127.0.0.1");
        assert_eq!(normalize_client_ip("2001:db8::1").unwrap(), "2001:db8::1");
        assert!(matches!(
            normalize_client_ip(""),
            Err(GatewayError::MissingClientIp)
        ));
        assert!(matches!(
            normalize_client_ip("not-an-ip"),
            Err(GatewayError::InvalidClientIp(_))
        ));
    }

    fn signed_callback(gw: &VnpayGateway, code: &str) -> HashMap<String, String> {
        let mut signed = BTreeMap::new();
        signed.insert("vnp_TxnRef", "7-abc".to_string());
        signed.insert("vnp_ResponseCode", code.to_string());
        signed.insert("vnp_TransactionNo", "14000001".to_string());
        signed.insert("vnp_OrderInfo", "Thanh toan dat phong 7".to_string());
        let hash = gw.sign(&signed).unwrap();

        let mut params: HashMap<String, String> = signed
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        params.insert("vnp_SecureHashType".into(), HASH_TYPE.into());
        params.insert("vnp_SecureHash".into(), hash);
        params
    }

    #[test]
    fn test_parse_callback_accepts_valid_signature() {
        let gw = gateway();
        let callback = gw.parse_callback(&signed_callback(&gw, "00")).unwrap();
        assert_eq!(callback.txn_ref, "7-abc");
        assert_eq!(callback.transaction_no, "14000001");
        assert!(gw.is_success(&callback));

        let failed = gw.parse_callback(&signed_callback(&gw, "24")).unwrap();
        assert!(!gw.is_success(&failed));
    }

    #[test]
    fn test_parse_callback_rejects_tampering() {
        let gw = gateway();
        let mut params = signed_callback(&gw, "24");
        params.insert("vnp_ResponseCode".into(), "00".into());
        assert!(matches!(
            gw.parse_callback(&params),
            Err(GatewayError::InvalidSignature)
        ));

        params.remove("vnp_SecureHash");
        assert!(matches!(
            gw.parse_callback(&params),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_lowercase_signature_is_accepted() {
        let gw = gateway();
        let mut params = signed_callback(&gw, "00");
        let lower = params["vnp_SecureHash"].to_lowercase();
        params.insert("vnp_SecureHash".into(), lower);
        assert!(gw.parse_callback(&params).is_ok());
    }
}
