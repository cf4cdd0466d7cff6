// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for robot/server communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod framing;
mod message;

pub use framing::{
    decode, encode, read_frame, read_message, write_frame, write_message, ProtocolError,
    MAX_MESSAGE_BYTES,
};
pub use message::{Message, MessageType, Payload, PROTOCOL_VERSION};
