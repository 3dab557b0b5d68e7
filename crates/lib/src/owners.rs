//! Product identifiers and the ordered owner set.
//!
//! An object's owners travel over the wire as a single metadata string
//! (`rh-products`), e.g. `"apache-commons,commons-lang3"`. [`OwnerSet::parse`]
//! and [`OwnerSet::to_wire`] are the only places that know about that encoding;
//! the lifecycle protocol works on the typed set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::OWNER_DELIMITER;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
  #[error("product id must not be empty")]
  Empty,

  #[error("product id '{0}' must not contain ','")]
  Delimiter(String),
}

/// A validated product identifier.
///
/// Surrounding whitespace is trimmed. Empty ids and ids containing the owner
/// delimiter are rejected, so every `ProductId` survives a wire round-trip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
  pub fn new(id: impl AsRef<str>) -> Result<Self, ProductError> {
    let id = id.as_ref().trim();
    if id.is_empty() {
      return Err(ProductError::Empty);
    }
    if id.contains(OWNER_DELIMITER) {
      return Err(ProductError::Delimiter(id.to_string()));
    }
    Ok(Self(id.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for ProductId {
  type Err = ProductError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

impl TryFrom<String> for ProductId {
  type Error = ProductError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl From<ProductId> for String {
  fn from(value: ProductId) -> Self {
    value.0
  }
}

/// Label for an optional product in log lines and error messages.
pub fn product_label(product: &Option<ProductId>) -> &str {
  product.as_ref().map(ProductId::as_str).unwrap_or("<none>")
}

/// Insertion-ordered set of owning products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSet(Vec<ProductId>);

impl OwnerSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Decode the wire form.
  ///
  /// Blank segments are dropped and a repeated id keeps its first position, so
  /// a hand-edited or legacy value still yields a valid set.
  pub fn parse(wire: &str) -> Self {
    let mut set = Self::new();
    for segment in wire.split(OWNER_DELIMITER) {
      if let Ok(product) = ProductId::new(segment) {
        set.insert(product);
      }
    }
    set
  }

  /// Encode the set in insertion order.
  pub fn to_wire(&self) -> String {
    let mut wire = String::new();
    for (i, product) in self.0.iter().enumerate() {
      if i > 0 {
        wire.push(OWNER_DELIMITER);
      }
      wire.push_str(product.as_str());
    }
    wire
  }

  pub fn contains(&self, product: &ProductId) -> bool {
    self.0.contains(product)
  }

  /// Append `product` unless already present. Returns whether the set changed.
  pub fn insert(&mut self, product: ProductId) -> bool {
    if self.contains(&product) {
      return false;
    }
    self.0.push(product);
    true
  }

  /// Remove `product`. Returns whether it was an owner.
  pub fn remove(&mut self, product: &ProductId) -> bool {
    match self.0.iter().position(|p| p == product) {
      Some(index) => {
        self.0.remove(index);
        true
      }
      None => false,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ProductId> {
    self.0.iter()
  }
}

impl FromIterator<ProductId> for OwnerSet {
  fn from_iter<I: IntoIterator<Item = ProductId>>(iter: I) -> Self {
    let mut set = Self::new();
    for product in iter {
      set.insert(product);
    }
    set
  }
}

impl fmt::Display for OwnerSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.to_wire())
  }
}
