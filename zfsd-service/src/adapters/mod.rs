// SPDX-License-Identifier: GPL-3.0-only

pub mod zfs;

pub use zfs::ZfsDatasetService;
