use chrono::Local;

/// `2021-09-22 21:30:00`, for console lines.
pub fn human_time() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `2021-09-22_21-30-00`, safe for file and directory names.
pub fn file_time() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `2021-09`, the monthly bucket run directories are grouped under.
pub fn month_bucket() -> String {
    Local::now().format("%Y-%m").to_string()
}
