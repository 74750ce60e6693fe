//! Provisioning wire protocol

pub mod frame;
pub mod request;

pub use {
    frame::{decode, decode_request, encode, encode_ready, encode_response, is_ready_signal},
    request::ProvisioningRequest,
};
