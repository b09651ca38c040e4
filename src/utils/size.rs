use std::time::Duration;

const SI_UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];

/// Formats a byte count with SI (base 1000) suffixes: `512B`, `2K`, `1.3M`,
/// `128K`. Values under 10 of a unit keep one decimal when it is non-zero,
/// everything else is truncated to a whole number.
pub fn human_size(bytes: u64) -> String {
    let mut unit = 0;
    let mut divisor: u64 = 1;
    while unit + 1 < SI_UNITS.len() && bytes / divisor >= 1000 {
        divisor *= 1000;
        unit += 1;
    }

    if unit == 0 {
        return format!("{}{}", bytes, SI_UNITS[0]);
    }

    let whole = bytes / divisor;
    if whole < 10 {
        let tenths = (bytes % divisor) * 10 / divisor;
        if tenths > 0 {
            return format!("{}.{}{}", whole, tenths, SI_UNITS[unit]);
        }
    }
    format!("{}{}", whole, SI_UNITS[unit])
}

/// `H:MM:SS`, sub-second precision dropped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
