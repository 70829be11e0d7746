//! 输出和输入工具

use innova_protocol::{Posture, Reading};
use serde_json::{Value, json};

/// 读数的 JSON 表示（可选附带姿态分类）
pub fn reading_json(reading: &Reading, classify: bool) -> Value {
    let mut value = json!({
        "sensor_id": reading.sensor_id(),
        "code": reading.code(),
        "received_at": reading.received_at(),
    });
    if classify {
        value["posture"] = json!(reading.posture());
    }
    value
}

/// 读数的文本表示
pub fn reading_text(reading: &Reading, classify: bool) -> String {
    if classify {
        format!("{} [{}]", reading, reading.posture())
    } else {
        reading.to_string()
    }
}

/// 去掉原始日志行的 `<毫秒时间戳>\t` 前缀（RawLogWriter 格式）
pub fn strip_log_prefix(line: &str) -> &str {
    match line.split_once('\t') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        },
        _ => line,
    }
}

/// 单行姿态描述
pub fn posture_line(code: &str, posture: Posture) -> String {
    format!(
        "{}\t{}\tcalories={}\trisk={}\tmessage={}\tvideo={}\tpicture={}",
        code,
        posture,
        posture.calories(),
        posture.risk_id(),
        posture.message_id(),
        posture.video_id().unwrap_or("-"),
        posture.picture_id().unwrap_or("-"),
    )
}
