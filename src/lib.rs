// Windows Installer toolset
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

//! Linker and binder for Windows Installer packages.
//!
//! Object files produced by a compiler are combined by the
//!   [linker](ld) into a single [`Output`](ld::Output),
//!   which the [binder](bind) then turns into an installer database
//!   along with its cabinets and uncompressed files.
//! Libraries of objects are written and read by [`obj`].
//!
//! Every diagnostic is reported through [`diagnose::Messages`],
//!   which owns the policy of whether warnings are errors and whether
//!   verbose messages are shown.

// Cross-module documentation links are valuable to readers of private
//   items as well.
#![allow(rustdoc::private_intra_doc_links)]

pub mod global;

#[macro_use]
pub mod convert;

pub mod action;
pub mod bind;
pub mod diagnose;
pub mod fs;
pub mod ld;
pub mod obj;
pub mod row;
pub mod schema;
pub mod span;
pub mod sym;
pub mod xir;
