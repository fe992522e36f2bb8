//! Cart line domain model and persisted payload codec.
//!
//! # Responsibility
//! - Define the record for one product entry in the cart.
//! - Convert the full cart collection to and from its stored JSON payload.
//!
//! # Invariants
//! - `id` is non-empty and unique within one collection.
//! - `quantity >= 1` for every line in a collection.
//! - `price` is finite and non-negative.
//! - Payload field names are `id`, `title`, `image_url`, `price`, `quantity`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable product identifier used as the cart line key.
pub type CartLineId = String;

/// One product entry in the cart with its quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog identifier; at most one line per id.
    pub id: CartLineId,
    /// Display title shown by cart views.
    pub title: String,
    /// Image reference (usually a remote URL).
    pub image_url: String,
    /// Unit price in the catalog currency.
    pub price: f64,
    /// Number of units; never zero while the line exists.
    pub quantity: u32,
}

/// Validation failures for `CartLine` and collection payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum CartLineValidationError {
    EmptyId,
    ZeroQuantity { id: CartLineId },
    InvalidPrice { id: CartLineId, price: f64 },
    DuplicateId(CartLineId),
}

impl Display for CartLineValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "cart line id cannot be empty"),
            Self::ZeroQuantity { id } => write!(f, "cart line `{id}` has zero quantity"),
            Self::InvalidPrice { id, price } => {
                write!(f, "cart line `{id}` has invalid price {price}")
            }
            Self::DuplicateId(id) => write!(f, "cart line id `{id}` appears more than once"),
        }
    }
}

impl Error for CartLineValidationError {}

impl CartLine {
    /// Creates a line with quantity 1.
    pub fn new(
        id: impl Into<CartLineId>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            image_url: image_url.into(),
            price,
            quantity: 1,
        }
    }

    /// Checks line-level invariants.
    pub fn validate(&self) -> Result<(), CartLineValidationError> {
        if self.id.trim().is_empty() {
            return Err(CartLineValidationError::EmptyId);
        }
        if self.quantity == 0 {
            return Err(CartLineValidationError::ZeroQuantity {
                id: self.id.clone(),
            });
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CartLineValidationError::InvalidPrice {
                id: self.id.clone(),
                price: self.price,
            });
        }
        Ok(())
    }

    /// Returns `price * quantity`.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Errors raised while decoding a stored cart payload.
#[derive(Debug)]
pub enum CartPayloadError {
    Malformed(serde_json::Error),
    Invalid(CartLineValidationError),
}

impl Display for CartPayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed cart payload: {err}"),
            Self::Invalid(err) => write!(f, "invalid cart payload: {err}"),
        }
    }
}

impl Error for CartPayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Invalid(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for CartPayloadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

impl From<CartLineValidationError> for CartPayloadError {
    fn from(value: CartLineValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// Serializes the full collection as a JSON array.
pub fn encode_cart_payload(lines: &[CartLine]) -> Result<String, CartPayloadError> {
    Ok(serde_json::to_string(lines)?)
}

/// Parses a stored JSON array back into a collection.
///
/// Rejects payloads whose lines break line invariants or repeat an id, so a
/// decoded collection can be adopted as cart state without further checks.
pub fn decode_cart_payload(raw: &str) -> Result<Vec<CartLine>, CartPayloadError> {
    let lines: Vec<CartLine> = serde_json::from_str(raw)?;
    validate_collection(&lines)?;
    Ok(lines)
}

fn validate_collection(lines: &[CartLine]) -> Result<(), CartLineValidationError> {
    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        line.validate()?;
        if !seen.insert(line.id.as_str()) {
            return Err(CartLineValidationError::DuplicateId(line.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_cart_payload, encode_cart_payload, CartLine, CartLineValidationError,
        CartPayloadError,
    };

    #[test]
    fn new_line_starts_with_quantity_one() {
        let line = CartLine::new("a", "Apple", "https://img/a.png", 10.0);
        assert_eq!(line.quantity, 1);
        assert!(line.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_id_and_bad_price() {
        let blank = CartLine::new("  ", "Blank", "", 1.0);
        assert_eq!(blank.validate(), Err(CartLineValidationError::EmptyId));

        let negative = CartLine::new("n", "Negative", "", -1.0);
        assert!(matches!(
            negative.validate(),
            Err(CartLineValidationError::InvalidPrice { .. })
        ));

        let nan = CartLine::new("x", "NaN", "", f64::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn payload_uses_stable_field_names() {
        let line = CartLine::new("a", "Apple", "https://img/a.png", 10.5);
        let json = encode_cart_payload(&[line]).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"a","title":"Apple","image_url":"https://img/a.png","price":10.5,"quantity":1}]"#
        );
    }

    #[test]
    fn decode_accepts_empty_array() {
        assert!(decode_cart_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let raw = r#"[
            {"id":"a","title":"A","image_url":"","price":1.0,"quantity":1},
            {"id":"a","title":"A","image_url":"","price":1.0,"quantity":2}
        ]"#;
        let err = decode_cart_payload(raw).unwrap_err();
        assert!(matches!(
            err,
            CartPayloadError::Invalid(CartLineValidationError::DuplicateId(ref id)) if id == "a"
        ));
    }

    #[test]
    fn decode_rejects_zero_quantity_and_garbage() {
        let zero = r#"[{"id":"a","title":"A","image_url":"","price":1.0,"quantity":0}]"#;
        assert!(matches!(
            decode_cart_payload(zero),
            Err(CartPayloadError::Invalid(_))
        ));
        assert!(matches!(
            decode_cart_payload("{not json"),
            Err(CartPayloadError::Malformed(_))
        ));
        assert!(matches!(
            decode_cart_payload(r#"{"id":"a"}"#),
            Err(CartPayloadError::Malformed(_))
        ));
    }
}
