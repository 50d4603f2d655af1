use std::{fs, path::PathBuf};

use rust_xlsxwriter::Workbook;

fn test_temp_dir_path() -> PathBuf {
    let tmpdir = std::env::temp_dir();
    let pid = std::process::id();
    for val in 1..1000000 {
        let path = tmpdir.join(format!("shareledger-test-{pid}-{val}"));
        if !path.exists() {
            return path;
        }
    }
    panic!("Could not create temp directory path that does not already exist");
}

/// A fresh directory under the system temp dir, removed on drop.
pub struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new() -> TestDir {
        let path = test_temp_dir_path();
        fs::create_dir_all(&path).unwrap();
        TestDir { path }
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let skip_env_var = "SKIP_TEMP_DIR_CLEANUP_ON_FAIL";
        let skip_del_on_fail = shareledger::util::basic::env_var_non_empty(skip_env_var);
        if std::thread::panicking() && skip_del_on_fail {
            println!("TestDir: panicking. Skipping remove of {}", self.path.display());
        } else {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Writes an xlsx file with one sheet per (name, rows). Cells that parse as
/// numbers are written as numbers, the way a spreadsheet app would store
/// them. Empty cells are left unwritten.
pub fn write_xlsx(path: &PathBuf, sheets: &[(&str, &[&[&str]])]) {
    let mut wb = Workbook::new();
    for (name, rows) in sheets {
        let sheet = wb.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(n) => sheet.write(r, c, n).unwrap(),
                    Err(_) => sheet.write(r, c, *cell).unwrap(),
                };
            }
        }
    }
    wb.save(path).unwrap();
}
