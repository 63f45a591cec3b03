//! Whole-file reads and writes used by the on-disk caches.
//!
//! Writes go to a sibling temporary file which is renamed over the destination, so readers only
//! ever observe the previous or the new contents of a file.

use std::{
    ffi::OsString,
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

#[inline]
pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

pub fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    write_bytes_atomic(path, text.as_bytes())
}

/// Reads a file as a sequence of native-endian 32-bit words.
pub fn read_words(path: &Path) -> io::Result<Vec<u32>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!(
                "`{}` has a length of {} bytes which is not a whole number of words",
                path.display(),
                bytes.len()
            ),
        ));
    }

    Ok(bytemuck::allocation::pod_collect_to_vec(bytes.as_slice()))
}

pub fn write_words_atomic(path: &Path, words: &[u32]) -> io::Result<()> {
    write_bytes_atomic(path, bytemuck::cast_slice(words))
}

pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    if let Err(err) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("unnamed"));
    name.push(".tmp");
    path.with_file_name(name)
}
