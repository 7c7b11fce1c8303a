// SPDX-FileCopyrightText: Copyright (c) 2018-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

mod client;
mod codec;
mod error;
mod frame;
mod message;
mod transport;
pub mod util;

pub use client::Client;
pub use codec::tcp;
pub use error::*;
pub use frame::*;
pub use message::*;
pub use transport::*;
