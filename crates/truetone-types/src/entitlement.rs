//! Product entitlement types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ParseError;

/// Products sharing the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    /// Curated newsletter with personalized generations
    Newsletter,
    /// Standalone voice-matching product
    #[serde(alias = "true_tone")]
    TrueTone,
}

impl Product {
    /// Every known product
    pub const ALL: [Product; 2] = [Product::Newsletter, Product::TrueTone];

    /// Identifier used in API payloads and redirect parameters
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Newsletter => "newsletter",
            Self::TrueTone => "truetone",
        }
    }

    /// Identity provider property holding this product's entitlement flag
    pub const fn property_key(&self) -> &'static str {
        match self {
            Self::Newsletter => "has_newsletter_access",
            Self::TrueTone => "has_truetone_access",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Product {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newsletter" => Ok(Self::Newsletter),
            "truetone" | "true_tone" => Ok(Self::TrueTone),
            _ => Err(ParseError::InvalidProduct(s.to_string())),
        }
    }
}

/// Normalize a raw identity provider property value into a flag.
///
/// The provider returns flags either as JSON booleans or as strings, so both
/// `true` and `"true"` count as set. Anything else is unset.
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Product entitlements held by a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    /// Newsletter access flag
    pub newsletter: bool,
    /// TrueTone access flag
    pub truetone: bool,
}

impl Entitlements {
    /// Whether the user holds the given product
    pub fn has(&self, product: Product) -> bool {
        match product {
            Product::Newsletter => self.newsletter,
            Product::TrueTone => self.truetone,
        }
    }

    /// Record a flag for a product
    pub fn set(&mut self, product: Product, granted: bool) {
        match product {
            Product::Newsletter => self.newsletter = granted,
            Product::TrueTone => self.truetone = granted,
        }
    }

    /// Whether the user holds no known product (not yet onboarded)
    pub fn is_empty(&self) -> bool {
        Product::ALL.iter().all(|p| !self.has(*p))
    }

    /// First product the user holds other than `required`
    pub fn other_than(&self, required: Product) -> Option<Product> {
        Product::ALL
            .into_iter()
            .find(|p| *p != required && self.has(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_flag_accepts_bool_and_string_forms() {
        assert!(coerce_flag(&json!(true)));
        assert!(coerce_flag(&json!("true")));
        assert!(coerce_flag(&json!("TRUE")));
        assert!(coerce_flag(&json!(" true ")));
    }

    #[test]
    fn test_coerce_flag_rejects_everything_else() {
        assert!(!coerce_flag(&json!(false)));
        assert!(!coerce_flag(&json!("false")));
        assert!(!coerce_flag(&json!("yes")));
        assert!(!coerce_flag(&json!(1)));
        assert!(!coerce_flag(&json!(null)));
        assert!(!coerce_flag(&json!(["true"])));
    }

    #[test]
    fn test_product_property_keys() {
        assert_eq!(Product::Newsletter.property_key(), "has_newsletter_access");
        assert_eq!(Product::TrueTone.property_key(), "has_truetone_access");
    }

    #[test]
    fn test_other_than() {
        let mut ent = Entitlements::default();
        assert!(ent.is_empty());
        assert_eq!(ent.other_than(Product::Newsletter), None);

        ent.set(Product::TrueTone, true);
        assert!(!ent.is_empty());
        assert_eq!(ent.other_than(Product::Newsletter), Some(Product::TrueTone));
        assert_eq!(ent.other_than(Product::TrueTone), None);
    }

    #[test]
    fn test_product_parse() {
        assert_eq!("TrueTone".parse::<Product>().unwrap(), Product::TrueTone);
        assert_eq!("newsletter".parse::<Product>().unwrap(), Product::Newsletter);
        assert!("podcast".parse::<Product>().is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn only_true_strings_coerce(s in "\\PC*") {
                let expected = s.trim().eq_ignore_ascii_case("true");
                prop_assert_eq!(coerce_flag(&Value::String(s)), expected);
            }

            #[test]
            fn numbers_never_coerce(n in any::<i64>()) {
                prop_assert!(!coerce_flag(&json!(n)));
            }
        }
    }
}
