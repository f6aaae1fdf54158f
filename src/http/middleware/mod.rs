//! Request middleware, listed in the order requests traverse it.

pub mod ingress;
pub mod decode;

pub use decode::{decode_middleware, DecodeState, JsonBody};
pub use ingress::{ingress_middleware, IngressState};
