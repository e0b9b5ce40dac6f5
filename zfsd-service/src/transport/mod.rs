// SPDX-License-Identifier: GPL-3.0-only

pub mod http;
pub mod listener;

pub use http::create_router;
pub use listener::serve;
