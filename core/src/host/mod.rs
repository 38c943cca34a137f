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

//! Wire framings shared between hosts and their clients: the signed
//! host announcement carried in arbitrary data, and the payment
//! request messages used to pay by contract or by ephemeral account.

pub mod announcement;
pub mod payment;

pub use self::announcement::{create_announcement, decode_announcement};
pub use self::payment::{
	PayByContractRequest, PayByEphemeralAccountRequest, WithdrawalMessage,
};
