use std::time::{SystemTime, UNIX_EPOCH};

/// Joins path segments with `/`, keeping a single leading slash.
pub(crate) fn join_path(parts: &[&str]) -> String {
    let mut path = String::new();
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(part);
    }
    path
}

pub(crate) fn unix_time_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or_default()
}
