//! Newtype IDs for type-safe entity references.
//!
//! The marketplace data service hands out 64-bit integer keys for every
//! entity. Use the `define_id!` macro to wrap them so a store ID can never be
//! passed where an order ID is expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use marketplace_core::define_id;
/// define_id!(ShopperId);
/// define_id!(CouponId);
///
/// let shopper_id = ShopperId::new(1);
/// let coupon_id = CouponId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ShopperId = coupon_id;
/// assert_eq!(shopper_id.as_i64(), coupon_id.as_i64());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Entity IDs handed out by the marketplace data service
define_id!(StoreId);
define_id!(CartItemId);
define_id!(ProductId);
define_id!(AddressId);
define_id!(OrderId);
define_id!(CityId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let parsed: StoreId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, StoreId::new(7));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(CartItemId::new(15).to_string(), "15");
    }

    #[test]
    fn test_id_conversions() {
        let id: AddressId = 9.into();
        let raw: i64 = id.into();
        assert_eq!(raw, 9);
        assert_eq!(id.as_i64(), 9);
    }
}
