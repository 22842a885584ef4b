// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Carry DCCP over UDP-only paths.
//!
//! Outbound DCCP packets in a configured port range have their
//! extended header re-encoded, in place, as a UDP header; inbound
//! UDP packets in the same range are restored to DCCP. See
//! [`engine::Converter`].

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]
#![allow(clippy::len_without_is_empty)]

pub mod engine;
pub mod print;

pub use udccp_api as api;
