//! Wire format and externally-supplied bundle types (§3, §6).

mod evidence;
mod report;
mod wire;

pub use evidence::{Evidence, Location};
pub use report::{RiskDistribution, SessionReport};
pub use wire::{decode_signed_response, encode_signed_response, ResponsePayload, SignedResponse, WireError};
