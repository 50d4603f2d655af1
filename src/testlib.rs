use std::fmt::Debug;

use regex::Regex;

use crate::workbook::{Grid, Sheet, Workbook};

pub fn assert_re(pattern: &str, haystack: &str) {
    let re = Regex::new(pattern).unwrap();
    assert!(re.is_match(haystack), "{:?} did not match {:?}", haystack, re);
}

/// Like assert_eq, but prints each mismatched element on its own, which is
/// much easier to read for vecs of large structs.
pub fn assert_vec_eq<T: PartialEq + Debug>(left: Vec<T>, right: Vec<T>) {
    if left == right {
        return;
    }
    eprintln!("left: {:#?}\nright: {:#?}", left, right);
    if left.len() != right.len() {
        panic!("size of left ({}) != size of right ({})", left.len(), right.len());
    }
    for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        if l != r {
            eprintln!("Mismatch at index {}:\nleft: {:#?} != right: {:#?}", i, l, r);
        }
    }
    panic!("left != right");
}

/// Builds a grid from string literals.
pub fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

/// The smallest workbook that imports: an issuer sheet, and a transfer
/// journal with one IPO row.
pub fn minimal_registry_workbook() -> Workbook {
    Workbook {
        file_name: "acme.xlsx".to_string(),
        fingerprint: "5a1e".to_string(),
        sheets: vec![
            Sheet::new("Issuer Info", grid(&[&["Issuer Name", "Acme Corp"]])),
            Sheet::new(
                "Sheet2",
                grid(&[
                    &["Cusip", "Transaction Type", "Credit/Debit", "Quantity", "Transaction Date", "Account"],
                    &["123456789", "IPO", "Credit", "1000", "01/01/2024", "ACC-1"],
                ]),
            ),
        ],
    }
}
