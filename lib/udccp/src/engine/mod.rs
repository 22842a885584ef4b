// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The conversion engine.
pub mod checksum;
pub mod conv;
pub mod dccp;
pub mod gate;
pub mod ip4;
pub mod packet;
pub mod transcode;

pub use conv::Converter;
pub use packet::OffloadFlags;
pub use packet::PacketBuf;
