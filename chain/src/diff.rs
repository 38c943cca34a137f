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

//! The diff engine.
//!
//! Applying a block generates an ordered list of tagged diffs; the same
//! list, traversed in reverse with every tag inverted, reverts it
//! exactly. A diff's recorded direction says what happened during the
//! apply (`Apply` created, `Revert` destroyed); committing the list in
//! the `Revert` direction performs each entry's inverse.

use uplo_core::core::currency::Currency;
use uplo_core::core::transaction::{
	CoinOutput, CoinOutputID, FileContract, FileContractID, FundOutput, FundOutputID,
};
use uplo_core::ser::{self, Readable, Reader, Writeable, Writer};

use crate::error::Error;
use crate::state;
use crate::store::WriteTx;

/// The direction a diff set is committed in.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DiffDirection {
	/// Forward, as the block was originally applied.
	Apply,
	/// Backward, undoing the block.
	Revert,
}

impl DiffDirection {
	/// The opposite direction.
	pub fn inverse(&self) -> DiffDirection {
		match self {
			DiffDirection::Apply => DiffDirection::Revert,
			DiffDirection::Revert => DiffDirection::Apply,
		}
	}
}

impl Writeable for DiffDirection {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bool(*self == DiffDirection::Apply)
	}
}

impl Readable for DiffDirection {
	fn read(reader: &mut dyn Reader) -> Result<DiffDirection, ser::Error> {
		Ok(if reader.read_bool()? {
			DiffDirection::Apply
		} else {
			DiffDirection::Revert
		})
	}
}

/// One structured state change generated while applying a block.
#[derive(Clone, Debug, PartialEq)]
pub enum Diff {
	/// A coin output created (`Apply`) or destroyed (`Revert`).
	CoinOutput {
		/// What happened during the block's apply.
		direction: DiffDirection,
		/// The output's id.
		id: CoinOutputID,
		/// The output's body.
		output: CoinOutput,
	},
	/// A fund output created or destroyed.
	FundOutput {
		/// What happened during the block's apply.
		direction: DiffDirection,
		/// The output's id.
		id: FundOutputID,
		/// The output's body.
		output: FundOutput,
	},
	/// A file contract created or destroyed. Its expiration entry moves
	/// with it.
	FileContract {
		/// What happened during the block's apply.
		direction: DiffDirection,
		/// The contract's id.
		id: FileContractID,
		/// The contract's body.
		contract: FileContract,
	},
	/// A delayed coin output entered or left a maturation bucket.
	DelayedCoinOutput {
		/// What happened during the block's apply.
		direction: DiffDirection,
		/// The output's id.
		id: CoinOutputID,
		/// The output's body.
		output: CoinOutput,
		/// The height at which the output matures.
		maturity_height: u64,
	},
	/// The fund pool moved from one value to another.
	FundPool {
		/// The pool before the block.
		previous: Currency,
		/// The pool after the block.
		adjusted: Currency,
	},
}

impl Writeable for Diff {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		match self {
			Diff::CoinOutput {
				direction,
				id,
				output,
			} => {
				writer.write_u8(0)?;
				direction.write(writer)?;
				id.write(writer)?;
				output.write(writer)
			}
			Diff::FundOutput {
				direction,
				id,
				output,
			} => {
				writer.write_u8(1)?;
				direction.write(writer)?;
				id.write(writer)?;
				output.write(writer)
			}
			Diff::FileContract {
				direction,
				id,
				contract,
			} => {
				writer.write_u8(2)?;
				direction.write(writer)?;
				id.write(writer)?;
				contract.write(writer)
			}
			Diff::DelayedCoinOutput {
				direction,
				id,
				output,
				maturity_height,
			} => {
				writer.write_u8(3)?;
				direction.write(writer)?;
				id.write(writer)?;
				output.write(writer)?;
				writer.write_u64(*maturity_height)
			}
			Diff::FundPool {
				previous,
				adjusted,
			} => {
				writer.write_u8(4)?;
				previous.write(writer)?;
				adjusted.write(writer)
			}
		}
	}
}

impl Readable for Diff {
	fn read(reader: &mut dyn Reader) -> Result<Diff, ser::Error> {
		match reader.read_u8()? {
			0 => Ok(Diff::CoinOutput {
				direction: DiffDirection::read(reader)?,
				id: CoinOutputID::read(reader)?,
				output: CoinOutput::read(reader)?,
			}),
			1 => Ok(Diff::FundOutput {
				direction: DiffDirection::read(reader)?,
				id: FundOutputID::read(reader)?,
				output: FundOutput::read(reader)?,
			}),
			2 => Ok(Diff::FileContract {
				direction: DiffDirection::read(reader)?,
				id: FileContractID::read(reader)?,
				contract: FileContract::read(reader)?,
			}),
			3 => Ok(Diff::DelayedCoinOutput {
				direction: DiffDirection::read(reader)?,
				id: CoinOutputID::read(reader)?,
				output: CoinOutput::read(reader)?,
				maturity_height: reader.read_u64()?,
			}),
			4 => Ok(Diff::FundPool {
				previous: Currency::read(reader)?,
				adjusted: Currency::read(reader)?,
			}),
			_ => Err(ser::Error::CorruptedData),
		}
	}
}

impl Diff {
	/// The same diff with its recorded direction inverted. Pool diffs
	/// swap their endpoints.
	pub fn inverse(&self) -> Diff {
		match self {
			Diff::CoinOutput {
				direction,
				id,
				output,
			} => Diff::CoinOutput {
				direction: direction.inverse(),
				id: *id,
				output: output.clone(),
			},
			Diff::FundOutput {
				direction,
				id,
				output,
			} => Diff::FundOutput {
				direction: direction.inverse(),
				id: *id,
				output: output.clone(),
			},
			Diff::FileContract {
				direction,
				id,
				contract,
			} => Diff::FileContract {
				direction: direction.inverse(),
				id: *id,
				contract: contract.clone(),
			},
			Diff::DelayedCoinOutput {
				direction,
				id,
				output,
				maturity_height,
			} => Diff::DelayedCoinOutput {
				direction: direction.inverse(),
				id: *id,
				output: output.clone(),
				maturity_height: *maturity_height,
			},
			Diff::FundPool {
				previous,
				adjusted,
			} => Diff::FundPool {
				previous: adjusted.clone(),
				adjusted: previous.clone(),
			},
		}
	}
}

/// Commits a single diff in the given direction.
pub fn commit_diff(tx: &mut dyn WriteTx, diff: &Diff, dir: DiffDirection) -> Result<(), Error> {
	match diff {
		Diff::CoinOutput {
			direction,
			id,
			output,
		} => {
			if *direction == dir {
				state::add_coin_output(tx, id, output)
			} else {
				state::remove_coin_output(tx, id)
			}
		}
		Diff::FundOutput {
			direction,
			id,
			output,
		} => {
			if *direction == dir {
				state::add_fund_output(tx, id, output)
			} else {
				state::remove_fund_output(tx, id)
			}
		}
		Diff::FileContract {
			direction,
			id,
			contract,
		} => {
			if *direction == dir {
				state::add_file_contract(tx, id, contract)
			} else {
				state::remove_file_contract(tx, id)
			}
		}
		Diff::DelayedCoinOutput {
			direction,
			id,
			output,
			maturity_height,
		} => {
			if *direction == dir {
				state::add_delayed_coin_output(tx, *maturity_height, id, output)
			} else {
				state::remove_delayed_coin_output(tx, *maturity_height, id)
			}
		}
		Diff::FundPool {
			previous,
			adjusted,
		} => {
			let (before, after) = match dir {
				DiffDirection::Apply => (previous, adjusted),
				DiffDirection::Revert => (adjusted, previous),
			};
			let current = state::get_fund_pool(&*tx)?;
			if current != *before {
				return Err(Error::InconsistentState(format!(
					"fund pool is {} but diff expects {}",
					current, before
				)));
			}
			state::set_fund_pool(tx, after)
		}
	}
}

/// Commits a whole diff list: forward for `Apply`, in reverse order
/// with inverted tags for `Revert`. Applying then reverting a block is
/// the identity on the state.
pub fn commit_diff_set(
	tx: &mut dyn WriteTx,
	diffs: &[Diff],
	dir: DiffDirection,
) -> Result<(), Error> {
	match dir {
		DiffDirection::Apply => {
			for diff in diffs {
				commit_diff(tx, diff, dir)?;
			}
		}
		DiffDirection::Revert => {
			for diff in diffs.iter().rev() {
				commit_diff(tx, diff, dir)?;
			}
		}
	}
	Ok(())
}
