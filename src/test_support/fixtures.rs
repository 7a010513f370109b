//! Test fixtures: runtime packages, fake executables and runtime roots.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use semver::Version;

use crate::core::runtime::{RuntimeInstallation, RuntimeManifest, RUNTIME_MANIFEST};

/// Stand-in for the wine binary: prints its arguments and prefix.
pub const FAKE_WINE: &str = "#!/bin/sh\necho \"args: $*\"\necho \"WINEPREFIX=$WINEPREFIX\"\n";

/// Build a tar archive from `(path, contents)` pairs.
///
/// Entries ending in `bin/wine` get mode 0755, everything else 0644.
pub fn tar_entries(entries: &[(&str, &str)], gzip: bool) -> Vec<u8> {
    let mut tar_data = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_data);
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(if path.ends_with("bin/wine") { 0o755 } else { 0o644 });
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }

    if !gzip {
        return tar_data;
    }

    use std::io::Write;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

/// Compress `data` the way `.tar.xz` runtime builds are shipped.
pub fn xz_compress(data: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A gzipped runtime package with `<top>/bin/wine` and `<top>/lib/`.
pub fn runtime_tarball(top: &str) -> Vec<u8> {
    let wine = format!("{top}/bin/wine");
    let lib = format!("{top}/lib/libwine.so.1");
    let inf = format!("{top}/share/wine/wine.inf");
    tar_entries(
        &[
            (wine.as_str(), FAKE_WINE),
            (lib.as_str(), "ELF"),
            (inf.as_str(), "[version]"),
        ],
        true,
    )
}

/// Write a placeholder Windows executable at `dir/name`.
pub fn fake_exe(dir: &Path, name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"MZ\x90\x00").unwrap();
    path
}

/// Lay out an installed managed runtime at `root` and probe it.
pub fn fake_runtime(root: &Path) -> RuntimeInstallation {
    std::fs::create_dir_all(root.join("bin")).unwrap();
    std::fs::create_dir_all(root.join("lib")).unwrap();

    let binary = root.join("bin/wine");
    std::fs::write(&binary, FAKE_WINE).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let manifest = RuntimeManifest {
        version: Version::new(9, 0, 0),
        binary: PathBuf::from("bin/wine"),
        source: None,
    };
    std::fs::write(
        root.join(RUNTIME_MANIFEST),
        toml::to_string(&manifest).unwrap(),
    )
    .unwrap();

    let installed = RuntimeInstallation::probe(root);
    assert!(installed.is_installed(), "fake runtime did not probe as installed");
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fake_runtime_has_lib_dir() {
        let tmp = TempDir::new().unwrap();
        let runtime = fake_runtime(tmp.path());
        assert_eq!(runtime.lib_dir(), Some(tmp.path().join("lib")));
    }

    #[test]
    fn test_runtime_tarball_is_gzip() {
        let data = runtime_tarball("wine");
        assert_eq!(&data[..2], &[0x1f, 0x8b]);
    }
}
