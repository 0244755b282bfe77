//! Season folder layout: moving raw granule files into
//! `<season>/<sensor>/<tile>/<acquisition>/` and discovering them again.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::io::granule::{BandFile, GranuleId};

/// Plain files directly inside `dir` whose extension matches one of `extensions`
/// (case-insensitive), sorted by path.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move `file` into the folder of `granule` below `season_dir`, returning the new path
pub fn move_into_hierarchy(season_dir: &Path, file: &Path, granule: &GranuleId) -> Result<PathBuf> {
    let target_dir = season_dir.join(granule.relative_dir());
    fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(file_name(file));
    fs::rename(file, &target)?;
    debug!("Moved {:?} -> {:?}", file, target);
    Ok(target)
}

/// Move a granule file (band raster or browse image) into the hierarchy, deriving
/// its folder from the file name.
pub fn organize_granule_file(season_dir: &Path, file: &Path) -> Result<PathBuf> {
    let granule = GranuleId::parse(&file_name(file))?;
    move_into_hierarchy(season_dir, file, &granule)
}

/// Directories below `root` that contain no subdirectories, skipping any
/// directory named in `exclude` together with everything beneath it.
pub fn find_leaf_dirs(root: &Path, exclude: &[&str]) -> Result<Vec<PathBuf>> {
    let mut leaves = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !exclude.iter().any(|x| e.file_name() == *x)
        });
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let has_subdir = fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .any(|e| {
                e.file_type().map(|t| t.is_dir()).unwrap_or(false)
                    && !exclude.iter().any(|x| e.file_name() == *x)
            });
        if !has_subdir {
            leaves.push(entry.into_path());
        }
    }
    Ok(leaves)
}

/// Single-band rasters in `dir` whose band code is listed in `bands`, ordered as in
/// `bands`. Files that do not parse as HLS band files are ignored.
pub fn band_files(dir: &Path, bands: &[String]) -> Result<Vec<(PathBuf, BandFile)>> {
    let mut found: Vec<(usize, PathBuf, BandFile)> = Vec::new();
    for path in list_files(dir, &["tif", "tiff"])? {
        let Ok(bf) = BandFile::from_path(&path) else {
            debug!("Ignoring non-band file {:?}", path);
            continue;
        };
        if let Some(pos) = bands.iter().position(|b| *b == bf.band) {
            found.push((pos, path, bf));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(found.into_iter().map(|(_, p, bf)| (p, bf)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "HLS.S30.T17SLB.2020273T160941.v2.0";

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn moves_files_into_sensor_tile_date_folders() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join(format!("{}.B02.tif", ID));
        touch(&src);

        let moved = organize_granule_file(dir.path(), &src).unwrap();
        assert_eq!(
            moved,
            dir.path()
                .join("S30/T17SLB/2020273T160941")
                .join(format!("{}.B02.tif", ID))
        );
        assert!(moved.exists());
        assert!(!src.exists());
    }

    #[test]
    fn malformed_names_are_not_moved() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.tif");
        touch(&src);
        assert!(organize_granule_file(dir.path(), &src).is_err());
        assert!(src.exists());
    }

    #[test]
    fn lists_matching_extensions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.TIF", "a.tif", "c.jpg", "d.xml"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir(dir.path().join("sub.tif")).unwrap();
        let files = list_files(dir.path(), &["tif", "jpg"]).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["a.tif", "b.TIF", "c.jpg"]);
    }

    #[test]
    fn finds_leaf_directories_outside_excluded_trees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("S30");
        fs::create_dir_all(root.join("T1/D1")).unwrap();
        fs::create_dir_all(root.join("T1/D2")).unwrap();
        fs::create_dir_all(root.join("T2/D1")).unwrap();
        fs::create_dir_all(root.join("composites/tile_composites")).unwrap();

        let leaves = find_leaf_dirs(&root, &["composites"]).unwrap();
        assert_eq!(
            leaves,
            vec![root.join("T1/D1"), root.join("T1/D2"), root.join("T2/D1")]
        );
    }

    #[test]
    fn selects_band_files_in_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        for band in ["B04", "B02", "Fmask", "B03", "B09"] {
            touch(&dir.path().join(format!("{}.{}.tif", ID, band)));
        }
        touch(&dir.path().join(format!("{}.jpg", ID)));
        let bands: Vec<String> = ["B02", "B03", "B04"].map(String::from).to_vec();

        let found = band_files(dir.path(), &bands).unwrap();
        let labels: Vec<&str> = found.iter().map(|(_, bf)| bf.band.as_str()).collect();
        assert_eq!(labels, ["B02", "B03", "B04"]);
    }
}
