//! # JSON decoding stage (feature `json`).
//!
//! [`Flow::decode_json`] turns a flow of byte buffers into a flow of typed
//! values. A buffer that fails to parse terminates the chain with
//! [`FlowError::Decode`], which pairs naturally with `replace_error` or
//! `catch` further down.

use serde::de::DeserializeOwned;

use crate::core::Flow;
use crate::error::FlowError;

impl Flow<Vec<u8>, FlowError> {
    /// Parses each byte buffer as JSON into `D`.
    pub fn decode_json<D>(&self) -> Flow<D, FlowError>
    where
        D: DeserializeOwned + Send + 'static,
    {
        self.try_map(|bytes: Vec<u8>| {
            serde_json::from_slice(&bytes).map_err(|e| FlowError::Decode {
                reason: e.to_string(),
            })
        })
    }
}
