// Copyright 2020 The Uplo Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Uplo consensus set: a fork-aware, disk-backed state machine that
//! ingests blocks, keeps the heaviest chain, rolls state back and
//! forward across reorgs through per-block structured diffs, and
//! notifies subscribers of every committed change in order.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

mod apply;
mod pipe;
mod validate;

pub mod chain;
pub mod diff;
pub mod error;
pub mod state;
pub mod store;
pub mod subscribe;
pub mod types;

pub use crate::apply::{encode_foundation_update, FoundationUpdate};
pub use crate::chain::{Chain, DisruptHook, Options};
pub use crate::diff::{Diff, DiffDirection};
pub use crate::error::Error;
pub use crate::subscribe::{
	CancelToken, ConsensusChange, ConsensusChangeID, ConsensusSetSubscriber,
	CONSENSUS_CHANGE_BEGINNING, CONSENSUS_CHANGE_RECENT,
};
pub use crate::types::{Clock, ProcessedBlock, SystemClock};
