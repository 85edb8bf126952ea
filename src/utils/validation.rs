//! Centralized validation and helper functions.

use std::io::Read;
use std::path::Path;

/// Maximum number of records (tree nodes, table rows) read from one file
pub const MAX_RECORDS: usize = 5_000_000;

/// Validate that a string is a valid MD5 checksum (32 hex characters).
///
/// # Examples
///
/// ```
/// use redtax::utils::validation::is_valid_md5;
///
/// assert!(is_valid_md5("6aef897c3d6ff0c78aff06ac189178dd"));
/// assert!(!is_valid_md5("not-an-md5"));
/// assert!(!is_valid_md5("6aef897c3d6ff0c78aff06ac189178d")); // 31 chars
/// ```
#[must_use]
pub fn is_valid_md5(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize an MD5 string to lowercase.
/// Returns None if the input is not a valid MD5.
#[must_use]
pub fn normalize_md5(s: &str) -> Option<String> {
    if is_valid_md5(s) {
        Some(s.to_lowercase())
    } else {
        None
    }
}

/// Compute a signature hash from a set of strings.
///
/// The signature is computed by:
/// 1. Sorting the items
/// 2. Joining them with newlines
/// 3. Computing MD5 of the concatenated string
///
/// Input order and duplicates do not affect the result.
#[must_use]
pub fn compute_signature<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = items.into_iter().collect();
    if sorted.is_empty() {
        return String::new();
    }
    sorted.sort_unstable();
    sorted.dedup();
    let digest = md5::compute(sorted.join("\n").as_bytes());
    format!("{digest:x}")
}

/// MD5 of a file's contents, read in chunks
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened or read.
pub fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Check if adding another record would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new record.
/// Returns an error message if adding would exceed the limit, None if safe to add.
///
/// # Example
/// ```ignore
/// if check_record_limit(records.len()).is_some() {
///     return Err(...);
/// }
/// records.push(record); // Safe to add
/// ```
#[must_use]
pub fn check_record_limit(count: usize) -> Option<String> {
    if count >= MAX_RECORDS {
        Some(format!(
            "Too many records: adding another would exceed maximum of {MAX_RECORDS}"
        ))
    } else {
        None
    }
}

/// Convert a count to f64 for ratio computations
#[must_use]
#[allow(clippy::cast_precision_loss)] // counts are far below 2^52
pub fn count_to_f64(count: usize) -> f64 {
    count as f64
}
