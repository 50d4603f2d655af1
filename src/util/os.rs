/// Filesystem helpers for the standalone CLI. Not available to wasm builds.

use std::{fs, io, path::{Path, PathBuf}};

use super::basic::SError;

const APP_DIR_NAME: &str = ".shareledger";

pub fn mk_writable_dir(dirpath: &Path) -> io::Result<()> {
    fs::create_dir_all(dirpath)?;

    let mut perms = fs::metadata(dirpath)?.permissions();
    perms.set_readonly(false);
    #[cfg(unix)]
    {
        // Does not apply to Windows
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o700);
    }
    fs::set_permissions(dirpath, perms)
}

// Returns $HOME/.shareledger/<sub_dir>, creating it if needed.
pub fn app_dir_path(sub_dir: &str) -> Result<PathBuf, SError> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| SError::from("Unable to determine home directory"))?;

    let dir_path = home_dir.join(APP_DIR_NAME).join(sub_dir);
    mk_writable_dir(&dir_path)
        .map_err(|e| format!("Unable to create {}: {e}", dir_path.display()))?;
    Ok(dir_path)
}
