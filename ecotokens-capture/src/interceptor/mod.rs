//! Network response interception.
//!
//! Hooks wrap whatever issues requests on a chat page and hand every
//! response body to a shared [`ResponseTap`], which turns recognized usage
//! into messages on a channel.

pub mod client;
pub mod layer;
pub mod tap;

pub use client::{TappedClient, TappedResponse};
pub use layer::{HostCapabilities, InterceptionHandle, InterceptionLayer, RequestHook};
pub use tap::{ObservedResponse, ResponseTap};
