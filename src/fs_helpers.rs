// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! File system scaffolding: output path collision avoidance and output
//! directory creation.

use std::path::{Path, PathBuf};

/// If `dir/filename` already exists, appends `_1`, `_2`, ... before the
/// extension until a free path is found.
#[must_use]
pub fn unique_output_path(dir: &Path, filename: &str) -> PathBuf {
    let mut candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path.file_stem().map_or_else(|| filename.to_string(), |s| s.to_string_lossy().into_owned());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter: u64 = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn returns_bare_name_when_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = unique_output_path(dir.path(), "report.pdf");
        assert_eq!(path, dir.path().join("report.pdf"));
    }

    #[test]
    fn appends_counter_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"x").unwrap();
        let path = unique_output_path(dir.path(), "report.pdf");
        assert_eq!(path, dir.path().join("report_1.pdf"));
    }

    #[test]
    fn walks_counter_past_multiple_collisions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"x").unwrap();
        fs::write(dir.path().join("report_1.pdf"), b"x").unwrap();
        let path = unique_output_path(dir.path(), "report.pdf");
        assert_eq!(path, dir.path().join("report_2.pdf"));
    }

    #[test]
    fn handles_filenames_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();
        let path = unique_output_path(dir.path(), "README");
        assert_eq!(path, dir.path().join("README_1"));
    }
}
