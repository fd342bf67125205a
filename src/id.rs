//! Prefixed ID generation for Soundpay entities.
//!
//! All IDs use an `sp_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (which are bare UUIDs on the provider side).
//!
//! Format: `sp_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["sp_ord_", "sp_pay_", "sp_pur_", "sp_alb_", "sp_trk_", "sp_cfg_"];

/// Validate that a string is a valid Soundpay prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `sp_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate a provider-assigned payment identifier before any lookup or
/// outbound call. Provider ids are opaque; we only require a bounded length
/// and a URL-safe character set (the id is interpolated into the API path).
pub fn is_valid_provider_payment_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Entity types that have prefixed IDs in Soundpay.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Order,
    Payment,
    Purchase,
    Album,
    Track,
    SellerConfig,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Order => "sp_ord",
            Self::Payment => "sp_pay",
            Self::Purchase => "sp_pur",
            Self::Album => "sp_alb",
            Self::Track => "sp_trk",
            Self::SellerConfig => "sp_cfg",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

/// Opaque download token for a purchase. Unprefixed: tokens end up in email
/// links and must not look like internal entity ids.
pub fn gen_purchase_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::Order.gen_id();
        assert!(id.starts_with("sp_ord_"));
        // sp_ord_ (7 chars) + 32 hex chars = 39 chars total
        assert_eq!(id.len(), 39);
    }

    #[test]
    fn test_ids_are_unique() {
        let id1 = EntityType::Order.gen_id();
        let id2 = EntityType::Order.gen_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_is_valid_prefixed_id() {
        assert!(is_valid_prefixed_id("sp_ord_a1b2c3d4e5f6789012345678901234ab"));
        assert!(is_valid_prefixed_id("sp_pur_00000000000000000000000000000000"));

        assert!(is_valid_prefixed_id(&EntityType::Order.gen_id()));
        assert!(is_valid_prefixed_id(&EntityType::Purchase.gen_id()));

        assert!(!is_valid_prefixed_id("")); // empty
        assert!(!is_valid_prefixed_id("a1b2c3d4-e5f6-7890-1234-567890123456")); // plain UUID
        assert!(!is_valid_prefixed_id("sp_unknown_a1b2c3d4e5f6789012345678901234ab")); // unknown prefix
        assert!(!is_valid_prefixed_id("sp_ord_a1b2c3d4")); // too short
        assert!(!is_valid_prefixed_id("sp_ord_a1b2c3d4e5f6789012345678901234abcd")); // too long
        assert!(!is_valid_prefixed_id("sp_ord_a1b2c3d4e5f6789012345678901234gg")); // non-hex
        assert!(!is_valid_prefixed_id("ord_a1b2c3d4e5f6789012345678901234ab")); // missing sp_
    }

    #[test]
    fn test_is_valid_provider_payment_id() {
        assert!(is_valid_provider_payment_id(
            "2419a771-000f-5000-9000-1edaf29243f2"
        ));
        assert!(is_valid_provider_payment_id("abc_123"));

        assert!(!is_valid_provider_payment_id(""));
        assert!(!is_valid_provider_payment_id("has space"));
        assert!(!is_valid_provider_payment_id("slash/../etc"));
        assert!(!is_valid_provider_payment_id(&"x".repeat(65)));
    }

    #[test]
    fn test_purchase_token_shape() {
        let token = gen_purchase_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, gen_purchase_token());
    }
}
