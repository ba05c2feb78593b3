pub mod aggregate;
pub mod persist;
pub mod render;

pub use aggregate::{aggregate, format_interval, Report, ResultGroup, MISSING};
pub use persist::{
    create_run_dir, persist, run_dir_path, write_csv, PARSED_RESULTS_FILE, RAW_RESULTS_FILE,
    TABLE_CSV_FILE, TABLE_FILE,
};
pub use render::{render_table, NO_RESULTS};
