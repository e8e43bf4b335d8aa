use crate::matcher::LEVELS;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Which simulator binary produced a log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Normal,
    WpCapable,
    Unknown,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::WpCapable => "wp_capable",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WpMode {
    On,
    Off,
}

impl WpMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Producing binary and run mode of one log. Wrong-path mode is only ever on
/// for wrong-path capable logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    log_format: LogFormat,
    wp_mode: WpMode,
}

impl Classification {
    pub fn new(log_format: LogFormat, wp_enabled: bool) -> Self {
        let wp_mode = if wp_enabled && log_format == LogFormat::WpCapable {
            WpMode::On
        } else {
            WpMode::Off
        };
        Self {
            log_format,
            wp_mode,
        }
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn wp_mode(&self) -> WpMode {
        self.wp_mode
    }

    pub fn is_wp_capable(&self) -> bool {
        self.log_format == LogFormat::WpCapable
    }

    pub fn is_known(&self) -> bool {
        self.log_format != LogFormat::Unknown
    }
}

fn label_alternation() -> String {
    LEVELS
        .iter()
        .map(|level| regex::escape(level.label))
        .collect::<Vec<_>>()
        .join("|")
}

static WRONG_PATH_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?m)^(?:{})[ \t]+WRONG-PATH[ \t]+ACCESS:",
        label_alternation()
    );
    Regex::new(&pattern).expect("valid wrong-path signature regex")
});

static NORMAL_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?m)^cpu0->(?:{})[ \t]", label_alternation());
    Regex::new(&pattern).expect("valid normal signature regex")
});

static WRONG_PATH_ENABLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)wrong[ \t]+path[ \t]+enabled").expect("valid wp marker regex"));

/// Classify a log from its content alone. The wrong-path signature wins when
/// both signatures are present.
pub fn classify(text: &str) -> Classification {
    let log_format = if WRONG_PATH_SIGNATURE.is_match(text) {
        LogFormat::WpCapable
    } else if NORMAL_SIGNATURE.is_match(text) {
        LogFormat::Normal
    } else {
        LogFormat::Unknown
    };
    Classification::new(log_format, WRONG_PATH_ENABLED.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WP_LINE: &str =
        "LLC WRONG-PATH ACCESS:        10  LOAD:        4  USEFULL:        2  FILL:        3  USELESS:        1\n";
    const NORMAL_LINE: &str =
        "cpu0->cpu0_L1D LOAD      ACCESS:     100  HIT:      60  MISS:      40\n";

    #[test]
    fn wrong_path_line_marks_wp_capable() {
        let c = classify(WP_LINE);
        assert_eq!(c.log_format(), LogFormat::WpCapable);
        assert_eq!(c.wp_mode(), WpMode::Off);

        let text = format!("Wrong path enabled\n{WP_LINE}");
        assert_eq!(classify(&text).wp_mode(), WpMode::On);
        let text = format!("WRONG PATH ENABLED\n{WP_LINE}");
        assert_eq!(classify(&text).wp_mode(), WpMode::On);
    }

    #[test]
    fn bare_keyword_is_not_a_signature() {
        let c = classify("note: WRONG-PATH ACCESS: 10 seen in a comment\n");
        assert_eq!(c.log_format(), LogFormat::Unknown);
        let c = classify("cpu0_L1D WRONG-PATH summary pending\n");
        assert_eq!(c.log_format(), LogFormat::Unknown);
    }

    #[test]
    fn normal_prefix_marks_normal() {
        let c = classify(NORMAL_LINE);
        assert_eq!(c.log_format(), LogFormat::Normal);
        assert_eq!(c.wp_mode(), WpMode::Off);
        assert_eq!(classify("cpu0->LLC TOTAL ACCESS: 1\n").log_format(), LogFormat::Normal);
    }

    #[test]
    fn wp_mode_requires_wp_capable() {
        let text = format!("Wrong path enabled\n{NORMAL_LINE}");
        let c = classify(&text);
        assert_eq!(c.log_format(), LogFormat::Normal);
        assert_eq!(c.wp_mode(), WpMode::Off);

        let c = Classification::new(LogFormat::Unknown, true);
        assert_eq!(c.wp_mode(), WpMode::Off);
        assert!(!c.is_known());
    }

    #[test]
    fn wrong_path_signature_wins_over_normal() {
        let text = format!("{NORMAL_LINE}{WP_LINE}");
        assert_eq!(classify(&text).log_format(), LogFormat::WpCapable);
    }

    #[test]
    fn empty_text_is_unknown() {
        assert_eq!(classify("").log_format(), LogFormat::Unknown);
    }
}
