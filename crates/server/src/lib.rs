// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosts robot connections over the wire protocol and relays the events
//! the engine needs to advance queue, health, and recovery state.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod session;

pub use session::{
    RegistrySender, RobotSession, SessionCallbacks, SessionCommand, SessionRegistry, SessionState,
};
