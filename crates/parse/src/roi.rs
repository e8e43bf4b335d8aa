use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ROI_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"CPU\s+0\s+cumulative IPC:\s*(\S+)\s+instructions:\s*(\d+)\s+cycles:\s*(\d+)(?:\s+wp_cycles:\s*(\d+))?",
    )
    .expect("valid roi regex")
});

/// Core-0 region-of-interest totals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RoiRecord {
    pub inst: u64,
    pub cycles: u64,
    /// IPC as printed; `None` when the token was not a finite number.
    pub ipc: Option<f64>,
    pub wp_cycles: Option<u64>,
}

impl RoiRecord {
    /// `inst / cycles`; `None` on zero cycles.
    pub fn computed_ipc(&self) -> Option<f64> {
        (self.cycles > 0).then(|| self.inst as f64 / self.cycles as f64)
    }

    /// The printed IPC, else `inst / cycles`.
    pub fn display_ipc(&self) -> Option<f64> {
        self.ipc.or_else(|| self.computed_ipc())
    }
}

/// The last non-warmup ROI line in file order.
pub fn extract_roi(text: &str) -> Option<RoiRecord> {
    text.lines()
        .filter(|line| !is_warmup(line))
        .filter_map(|line| ROI_LINE.captures(line))
        .last()
        .and_then(|caps| {
            let ipc = caps[1].parse::<f64>().ok().filter(|v| v.is_finite());
            let inst = caps[2].parse::<u64>().ok()?;
            let cycles = caps[3].parse::<u64>().ok()?;
            let wp_cycles = caps.get(4).and_then(|m| m.as_str().parse::<u64>().ok());
            Some(RoiRecord {
                inst,
                cycles,
                ipc,
                wp_cycles,
            })
        })
}

fn is_warmup(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("warmup") || lower.contains("warm-up")
}
