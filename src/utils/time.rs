//! # 时间转换工具函数
//!
//! 提供 Unix 秒与公历日期时间之间的相互转换，以及 ISO 8601 字符串的解析。
//! 不引入额外的时间库（如 chrono），使用标准库手动转换。
//!
//! 上游返回的两种时间表示都经过这里归一化：
//! - 消息时间戳：浮点 Unix 秒
//! - 会话时间戳：ISO 8601 字符串（如 "2024-01-01T00:00:00.000Z"）

use std::time::{SystemTime, UNIX_EPOCH};

/// 日期时间分量（UTC）
///
/// `(年, 月, 日, 时, 分, 秒)`，由 [`unix_to_datetime`] 产出，供展示格式化使用。
pub type DateTimeParts = (u64, u64, u64, u64, u64, u64);

/// 将 Unix 秒转换为 UTC 日期时间分量
///
/// # 参数
/// - `secs` - 自 Unix epoch 以来的秒数（小数部分被截断）
///
/// # 返回值
/// `(year, month, day, hour, minute, second)` 六元组
pub fn unix_to_datetime(secs: f64) -> DateTimeParts {
    // 早于 epoch 的时间在本应用场景中不存在，统一按 epoch 处理
    let total_secs = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };

    let days = total_secs / 86400;
    let time_of_day = total_secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_date(days);

    (year, month, day, hours, minutes, seconds)
}

/// 将自 1970-01-01 以来的天数转换为 (年, 月, 日)
///
/// 使用公历日期计算算法，正确处理闰年。
/// 算法来源：Howard Hinnant, http://howardhinnant.github.io/date_algorithms.html
///
/// # 参数
/// - `days_since_epoch` - 自 Unix epoch (1970-01-01) 以来的天数
///
/// # 返回值
/// (year, month, day) 元组
pub fn days_to_date(days_since_epoch: u64) -> (u64, u64, u64) {
    // 将 epoch 偏移到公元 0 年 3 月 1 日以简化闰年计算
    let z = days_since_epoch + 719468;
    let era = z / 146097;
    let doe = z - era * 146097; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // year of era [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year [0, 365]
    let mp = (5 * doy + 2) / 153; // month index [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // day [1, 31]
    let m = if mp < 10 { mp + 3 } else { mp - 9 }; // month [1, 12]
    let y = if m <= 2 { y + 1 } else { y };

    (y, m, d)
}

/// 将 (年, 月, 日) 转换为自 1970-01-01 以来的天数
///
/// [`days_to_date`] 的逆运算，同样来自 Hinnant 的日期算法（days_from_civil）。
/// 仅用于解析 ISO 8601 字符串，输入保证晚于 epoch。
fn date_to_days(year: u64, month: u64, day: u64) -> u64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y / 400;
    let yoe = y - era * 400; // year of era [0, 399]
    let mp = if month > 2 { month - 3 } else { month + 9 }; // month index [0, 11]
    let doy = (153 * mp + 2) / 5 + day - 1; // day of year [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // day of era [0, 146096]

    era * 146097 + doe - 719468
}

/// 解析 ISO 8601 时间字符串为 Unix 秒
///
/// 接受上游会话列表返回的格式及其常见变体：
/// - `2024-01-01T00:00:00Z`
/// - `2024-01-01T00:00:00.123456Z`
/// - `2024-01-01T00:00:00+00:00`（仅零时区偏移）
///
/// # 参数
/// - `iso` - ISO 8601 格式的时间字符串
///
/// # 返回值
/// - `Some(secs)` - 解析成功，返回 Unix 秒（含小数部分）
/// - `None` - 格式不符合预期
pub fn parse_iso8601(iso: &str) -> Option<f64> {
    let (date_part, time_part) = iso.split_once('T')?;

    // 日期部分：YYYY-MM-DD
    let mut date_iter = date_part.splitn(3, '-');
    let year: u64 = date_iter.next()?.parse().ok()?;
    let month: u64 = date_iter.next()?.parse().ok()?;
    let day: u64 = date_iter.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || year < 1970 {
        return None;
    }

    // 时间部分：去掉结尾的时区标记（Z 或 +00:00）
    let time_raw = time_part
        .trim_end_matches('Z')
        .trim_end_matches("+00:00");

    let mut time_iter = time_raw.splitn(3, ':');
    let hour: u64 = time_iter.next()?.parse().ok()?;
    let minute: u64 = time_iter.next()?.parse().ok()?;
    // 秒可能带小数部分（如 "00.123456"）
    let second: f64 = time_iter.next().unwrap_or("0").parse().ok()?;
    if hour > 23 || minute > 59 || !(0.0..60.0).contains(&second) {
        return None;
    }

    let days = date_to_days(year, month, day);
    Some((days * 86400 + hour * 3600 + minute * 60) as f64 + second)
}

/// 获取当前时刻的 Unix 秒
///
/// 相对时间展示（"N 分钟前"）的参照点。
pub fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
