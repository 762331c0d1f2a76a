//! CLI command handlers, one file per command.

mod add;
mod checksum;
mod pause;
mod remove;
mod resume;
mod run;
mod set;
mod status;

pub use add::{run_add, AddArgs};
pub use checksum::run_checksum;
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use run::run_downloads;
pub use set::{run_set, SetArgs};
pub use status::run_status;

/// `1.5 MiB` style size, `-` when unknown.
pub(crate) fn human_bytes(n: i64) -> String {
    if n < 0 {
        return "-".into();
    }
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::human_bytes;

    #[test]
    fn sizes() {
        assert_eq!(human_bytes(-1), "-");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KiB");
        assert_eq!(human_bytes(1_259_161), "1.2 MiB");
    }
}
