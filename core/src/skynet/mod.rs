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

//! The content-addressed link layer: skylinks, the skyfile base-sector
//! layout, metadata and backups.

pub mod backup;
pub mod layout;
pub mod metadata;
pub mod skylink;

pub use self::layout::{SkyfileLayout, SKYFILE_LAYOUT_SIZE};
pub use self::metadata::{SkyfileMetadata, SkyfileSubfileMetadata};
pub use self::skylink::{Skylink, SECTOR_SIZE};
