//! Build directory management.
//!
//! Every run is a full rebuild: the build root is deleted and recreated empty
//! before anything is generated, and the image subdirectory is created right
//! before the render stage.

use std::io;
use std::path::Path;

/// Delete `root` with all its contents, then create it empty.
///
/// A missing `root` is not an error.
pub fn reset(root: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(root)
}

/// Create the image subdirectory (and the build root, if needed).
pub fn create_image_dir(image_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(image_dir)
}
