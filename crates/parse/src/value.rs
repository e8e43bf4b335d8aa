use champsum_schema::NumberStyle;

const LATENCY_SIGNIFICANT_DIGITS: usize = 4;

/// How a captured token is coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Count,
    Real,
}

/// One extracted metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Count(u64),
    Real(f64),
    /// The anchor line was found but the token was a NaN/inf marker, a bare
    /// dash, or otherwise not a number. Rendered blank, never as zero.
    Unparseable,
    Absent,
}

impl FieldValue {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Count(_) | Self::Real(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Count(v) => Some(v as f64),
            Self::Real(v) => Some(v),
            Self::Unparseable | Self::Absent => None,
        }
    }

    pub fn render(&self, style: NumberStyle) -> String {
        match *self {
            Self::Count(v) => v.to_string(),
            Self::Real(v) => render_real(v, style),
            Self::Unparseable | Self::Absent => String::new(),
        }
    }
}

pub fn parse_token(token: &str, kind: ValueKind) -> FieldValue {
    let token = token.trim();
    if token.is_empty() || token == "-" {
        return FieldValue::Unparseable;
    }
    match kind {
        ValueKind::Count => token
            .parse::<u64>()
            .map(FieldValue::Count)
            .unwrap_or(FieldValue::Unparseable),
        ValueKind::Real => match token.parse::<f64>() {
            Ok(v) if v.is_finite() => FieldValue::Real(v),
            _ => FieldValue::Unparseable,
        },
    }
}

pub fn render_real(value: f64, style: NumberStyle) -> String {
    match style {
        NumberStyle::Latency => format_general(value, LATENCY_SIGNIFICANT_DIGITS),
        NumberStyle::Mpki | NumberStyle::Decimal => format!("{:.4}", value),
        NumberStyle::Percent => format!("{:.2}", value),
        NumberStyle::Ipc => format!("{:.6}", value),
    }
}

/// `%g`-style rendering with `significant` digits: fixed notation for
/// exponents in `[-4, significant)`, scientific otherwise, trailing zeros
/// dropped.
pub fn format_general(value: f64, significant: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let precision = significant.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
