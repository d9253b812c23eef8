//! Payment gateway integration: outbound checkout-session creation and
//! inbound webhook authentication/decoding.

pub mod event;
pub mod intent;
pub mod signature;
pub mod stripe;
