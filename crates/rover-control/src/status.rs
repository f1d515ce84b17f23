//! 状态报告（供前端/CLI 轮询）

use crate::scan::ScanState;
use serde::Serialize;
use std::collections::BTreeMap;

/// 状态报告
///
/// 序列化字段为 camelCase：`running`、`results`、`linkConnected`、`sdrReady`、
/// `currentReading`、`currentAngle`、`speed`、`lastError`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub running: bool,
    pub results: BTreeMap<u32, f64>,
    pub link_connected: bool,
    pub sdr_ready: bool,
    pub current_reading: Option<f64>,
    pub current_angle: u32,
    pub speed: u8,
    pub last_error: Option<String>,
}

impl StatusReport {
    pub(crate) fn new(
        scan: ScanState,
        link_connected: bool,
        sdr_ready: bool,
        current_reading: Option<f64>,
        speed: u8,
    ) -> Self {
        Self {
            running: scan.running,
            results: scan.results,
            link_connected,
            sdr_ready,
            current_reading,
            current_angle: scan.current_angle,
            speed,
            last_error: scan.last_error,
        }
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
