// SPDX-License-Identifier: GPL-3.0-only

pub mod rpc;

pub use rpc::{RpcRequest, RpcResponse, dispatch};
