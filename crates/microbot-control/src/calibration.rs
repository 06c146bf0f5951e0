/// 校准值下限（含）
pub const CALIBRATION_MIN: f64 = 0.1;

/// 校准值上限（含）
pub const CALIBRATION_MAX: f64 = 1.0;

/// 按编辑框的宽松规则解析浮点数
///
/// 跳过前导空白，取最长的合法数字前缀，例如 `" 0.5abc"` 解析为 `0.5`；
/// 没有数字前缀（`"abc"`、`""`、`"NaN"`）时返回 None。
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        let inf = f64::INFINITY;
        return Some(if bytes.first() == Some(&b'-') { -inf } else { inf });
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // 指数部分只有后面跟数字时才算数
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// 解析并校验校准输入，合法时返回数值
///
/// 必须是有限数且满足 `0.1 <= value <= 1`。
pub fn parse_calibration(input: &str) -> Option<f64> {
    let value = parse_float_prefix(input)?;
    if !value.is_finite() || value < CALIBRATION_MIN || value > CALIBRATION_MAX {
        return None;
    }
    Some(value)
}
