pub mod logging;

pub use logging::{
    init_log_file, log_final_stats, log_startup, timestamp_now, truncate_text,
};
