//! Utilities pertaining to the filesystem
//!

use camino::Utf8Path;

/// Create a novel directory path if it does not exist already
///
/// If the directory already exists no operations are performed
///
/// * `label` - used to describe the error directory in an error message
///
pub fn create_dir_all(dir: &Utf8Path, label: &str) {
    if !dir.is_dir() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Can't create new {label} directory at '{dir}': {e}");
            std::process::exit(exitcode::CANTCREAT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_create_dir_all() {
        let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap()
            .join(format!("svclust_test_{}", std::process::id()));
        let nested = dir.join("a").join("b");
        create_dir_all(&nested, "test");
        assert!(nested.is_dir());

        // Repeated creation is a no-op
        create_dir_all(&nested, "test");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
