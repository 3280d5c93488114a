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

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn combine_missing_output_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("wixlib")?;
    cmd.arg("tests/data/frag.wixobj");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("-o OUTPUT"));

    Ok(())
}

#[test]
fn combine_objects_into_library() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let lib = dir.path().join("all.wixlib");

    let mut cmd = Command::cargo_bin("wixlib")?;
    cmd.arg("-o")
        .arg(&lib)
        .arg("tests/data/product.wixobj")
        .arg("tests/data/frag.wixobj");
    cmd.assert().success();

    let written = fs::read_to_string(&lib)?;
    assert!(written.contains("wixLibrary"));
    assert!(written.contains("payload.txt"));

    Ok(())
}

#[test]
fn combined_library_links() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let lib = dir.path().join("frag.wixlib");

    Command::cargo_bin("wixlib")?
        .arg("-o")
        .arg(&lib)
        .arg("tests/data/frag.wixobj")
        .assert()
        .success();

    Command::cargo_bin("wixld")?
        .arg("tests/data/product.wixobj")
        .arg(&lib)
        .arg("-b")
        .arg("tests/data")
        .arg("--sl")
        .arg("--temp")
        .arg(dir.path().join("temp"))
        .arg("-o")
        .arg(dir.path().join("product.msi"))
        .assert()
        .success();

    Ok(())
}
