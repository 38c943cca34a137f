#![no_main]
extern crate uplo_core;
#[macro_use]
extern crate libfuzzer_sys;

use uplo_core::core::block::Block;
use uplo_core::ser;

fuzz_target!(|data: &[u8]| {
	let mut d = data;
	let _t: Result<Block, ser::Error> = ser::deserialize_default(&mut d);
});
