// System-wide static configuration
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! System-wide static configuration.
//!
//! This module provides a system-wide configuration.
//! Subsystems should reference these values rather than defining their own
//!   and risk incompatibilities or maintenance issues as requirements
//!   change.
//!
//! By convention,
//!   import this entire module rather than individual members and reference
//!   them as `global::foo` to emphasize their nature and risk.

use std::time::Duration;

/// Version of the object (`wixObject`) file format produced and accepted
///   by this toolset.
///
/// Object files carrying any other version are rejected unless the
///   version check is explicitly suppressed.
pub const OBJECT_FORMAT_VERSION: &str = "2.0.5805.0";

/// Version of the library (`wixLibrary`) file format.
pub const LIBRARY_FORMAT_VERSION: &str = "2.0.5805.0";

/// Namespace of object files.
pub const OBJECT_NAMESPACE: &str =
    "http://schemas.microsoft.com/wix/2003/04/objects";

/// Namespace of library files.
pub const LIBRARY_NAMESPACE: &str =
    "http://schemas.microsoft.com/wix/2003/04/libraries";

/// Name of the embedded cabinet stream holding the files of a merge
///   module.
pub const MODULE_CABINET_NAME: &str = "MergeModule.CABinet";

/// Number of attempts made to delete the temporary directory of a bind.
pub const TEMP_CLEANUP_ATTEMPTS: usize = 3;

/// Delay between retries of a failed file transfer or cleanup.
///
/// This is a blocking sleep;
///   there is no cancellation contract.
pub const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Summary information property id of the word count,
///   whose bit [`SUMMARY_WORD_COUNT_COMPRESSED`] signals that files are
///   compressed by default.
pub const SUMMARY_WORD_COUNT_PID: i32 = 15;

/// Word count bit indicating that files are compressed by default.
pub const SUMMARY_WORD_COUNT_COMPRESSED: i32 = 2;
