#![no_main]
extern crate uplo_core;
#[macro_use]
extern crate libfuzzer_sys;

use std::str::FromStr;
use uplo_core::skynet::Skylink;

fuzz_target!(|data: &[u8]| {
	if let Ok(s) = std::str::from_utf8(data) {
		let _t = Skylink::from_str(s);
	}
});
