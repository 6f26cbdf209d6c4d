// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trunking: control-channel following, band plans, patches.
//!
//! The [`TrunkSm`] consumes grant/sync/release events produced by the
//! protocol frame handlers and arbitrates retunes through the
//! [`ControlHooks`] vtable. Identifier tables, the patch/regroup table and
//! the CC candidate ring live here with it; everything runs on the decode
//! worker thread.

mod candidates;
mod hooks;
mod iden;
mod patch;
mod sm;

pub use candidates::CandidateRing;
pub use hooks::{ControlHooks, NullHooks, RecordingHooks};
pub use iden::{nxdn_dcr_freq, ChannelFreq, IdenEntry, IdenTable, Trust};
pub use patch::{PatchEntry, PatchTable};
pub use sm::{GrantClass, Role, ServiceOptions, TrunkSm};
