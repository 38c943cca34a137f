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

//! Logging wrapper to be used throughout all crates in the workspace.

use crate::types::{LogLevel, LoggingConfig};
use crate::Mutex;

use log::{LevelFilter, Record};
use log4rs;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::{threshold::ThresholdFilter, Filter, Response};

fn convert_log_level(in_level: &LogLevel) -> LevelFilter {
	match *in_level {
		LogLevel::Info => LevelFilter::Info,
		LogLevel::Warning => LevelFilter::Warn,
		LogLevel::Debug => LevelFilter::Debug,
		LogLevel::Trace => LevelFilter::Trace,
		LogLevel::Error => LevelFilter::Error,
	}
}

lazy_static! {
	/// Flag to observe whether logging was explicitly initialized
	static ref WAS_INIT: Mutex<bool> = Mutex::new(false);
	/// Static Logging configuration, should only be set once, before first logging call
	static ref LOGGING_CONFIG: Mutex<LoggingConfig> = Mutex::new(LoggingConfig::default());
}

const LOGGING_PATTERN: &str = "{d(%Y%m%d %H:%M:%S%.3f)} {h({l})} {M} - {m}{n}";

/// This filter is rejecting messages that doesn't start with "uplo"
/// in order to save log space for only Uplo-related records.
#[derive(Debug)]
struct UploFilter;

impl Filter for UploFilter {
	fn filter(&self, record: &Record<'_>) -> Response {
		if let Some(module_path) = record.module_path() {
			if module_path.starts_with("uplo") {
				return Response::Neutral;
			}
		}
		Response::Reject
	}
}

/// Initialize the logger with the given configuration.
pub fn init_logger(config: Option<LoggingConfig>) {
	if let Some(c) = config {
		let level_stdout = convert_log_level(&c.stdout_log_level);
		let level_file = convert_log_level(&c.file_log_level);
		let level_minimum = if level_stdout > level_file {
			level_stdout
		} else {
			level_file
		};

		// Save current logging configuration.
		let mut config_ref = LOGGING_CONFIG.lock();
		*config_ref = c.clone();

		let mut root = Root::builder();
		let mut appenders = vec![];

		if c.log_to_stdout {
			let filter = Box::new(ThresholdFilter::new(level_stdout));
			appenders.push(
				Appender::builder()
					.filter(filter)
					.filter(Box::new(UploFilter))
					.build(
						"stdout",
						Box::new(
							ConsoleAppender::builder()
								.encoder(Box::new(PatternEncoder::new(&LOGGING_PATTERN)))
								.build(),
						),
					),
			);
			root = root.appender("stdout");
		}

		if c.log_to_file {
			let filter = Box::new(ThresholdFilter::new(level_file));
			let file: Box<dyn log4rs::append::Append> = {
				if let Some(size) = c.log_max_size {
					let count = c.log_max_files.unwrap_or(32);
					let roller = FixedWindowRoller::builder()
						.build(&format!("{}.{{}}.gz", c.log_file_path), count)
						.expect("logging roller");
					let trigger = SizeTrigger::new(size);
					let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));
					Box::new(
						RollingFileAppender::builder()
							.append(c.log_file_append)
							.encoder(Box::new(PatternEncoder::new(&LOGGING_PATTERN)))
							.build(c.log_file_path.clone(), Box::new(policy))
							.expect("logging file appender"),
					)
				} else {
					Box::new(
						FileAppender::builder()
							.append(c.log_file_append)
							.encoder(Box::new(PatternEncoder::new(&LOGGING_PATTERN)))
							.build(c.log_file_path.clone())
							.expect("logging file appender"),
					)
				}
			};
			appenders.push(
				Appender::builder()
					.filter(filter)
					.filter(Box::new(UploFilter))
					.build("file", file),
			);
			root = root.appender("file");
		}

		let config = Config::builder()
			.appenders(appenders)
			.build(root.build(level_minimum))
			.expect("logging configuration");

		let _ = log4rs::init_config(config);

		info!(
			"log4rs is configured as: {:?}, level: {:?}, main level: {:?}",
			c.log_file_path, level_file, level_minimum
		);
		let mut was_init_ref = WAS_INIT.lock();
		*was_init_ref = true;
	}
}

/// Initializes the logger for unit and integration tests.
pub fn init_test_logger() {
	let mut was_init_ref = WAS_INIT.lock();
	if *was_init_ref {
		return;
	}
	let mut logger = LoggingConfig::default();
	logger.log_to_file = false;
	logger.stdout_log_level = LogLevel::Debug;

	let level_stdout = convert_log_level(&logger.stdout_log_level);

	let mut config_ref = LOGGING_CONFIG.lock();
	*config_ref = logger;

	let config = Config::builder()
		.appender(
			Appender::builder()
				.filter(Box::new(ThresholdFilter::new(level_stdout)))
				.build(
					"stdout",
					Box::new(
						ConsoleAppender::builder()
							.encoder(Box::new(PatternEncoder::new(&LOGGING_PATTERN)))
							.build(),
					),
				),
		)
		.build(Root::builder().appender("stdout").build(level_stdout))
		.expect("logging configuration");

	let _ = log4rs::init_config(config);
	*was_init_ref = true;
}
