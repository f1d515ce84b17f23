//! SDR 功率采样

use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use tracing::warn;

/// 无信号/读取失败时返回的噪声底（dB）
pub const NOISE_FLOOR_DB: f64 = -100.0;

/// 每次测量读取的复数样本数
pub const SAMPLES_PER_READ: usize = 4096;

/// 功率采样器
///
/// 每次调用读取一块样本并返回相对功率（dB）。
/// 实现可以阻塞（读取 SDR 的一块样本通常需要几毫秒）。
pub trait PowerSampler: Send {
    fn sample_power(&mut self) -> f64;
}

impl<F> PowerSampler for F
where
    F: FnMut() -> f64 + Send,
{
    fn sample_power(&mut self) -> f64 {
        self()
    }
}

/// 可替换的采样器插槽（`None` 表示 SDR 未就绪）
pub type SamplerSlot = Arc<Mutex<Option<Box<dyn PowerSampler>>>>;

/// 创建采样器插槽
pub fn sampler_slot(sampler: Option<Box<dyn PowerSampler>>) -> SamplerSlot {
    Arc::new(Mutex::new(sampler))
}

/// 由交织的 8 位无符号 IQ 样本（rtl-sdr 原始格式）计算功率
///
/// 样本先归一化到 `[-1, 1]`，功率为 `10 * log10(mean(|z|^2) + 1e-20)`。
/// 空输入返回 [`NOISE_FLOOR_DB`]；奇数长度时忽略最后一个字节。
///
/// ```
/// use rover_control::power_db;
///
/// // 127/128 附近是零点
/// assert!(power_db(&[128, 128, 127, 127]) < -40.0);
/// // 满幅
/// assert!((power_db(&[255, 255, 0, 0]) - 3.01).abs() < 0.01);
/// ```
pub fn power_db(iq: &[u8]) -> f64 {
    let pairs = iq.len() / 2;
    if pairs == 0 {
        return NOISE_FLOOR_DB;
    }

    let normalize = |b: u8| (b as f64 - 127.5) / 127.5;
    let sum: f64 = iq
        .chunks_exact(2)
        .map(|pair| {
            let i = normalize(pair[0]);
            let q = normalize(pair[1]);
            i * i + q * q
        })
        .sum();

    10.0 * (sum / pairs as f64 + 1e-20).log10()
}

/// 从原始 IQ 字节流采样（如 `rtl_sdr -f 433.4e6 -s 1024000 -` 的输出）
///
/// 每次读取 [`SAMPLES_PER_READ`] 个样本；读取失败或流结束时返回 [`NOISE_FLOOR_DB`]。
pub struct IqStreamSampler<R> {
    reader: R,
    buf: Vec<u8>,
    exhausted: bool,
}

impl<R: Read + Send> IqStreamSampler<R> {
    pub fn new(reader: R) -> Self {
        Self::with_block_size(reader, SAMPLES_PER_READ)
    }

    pub fn with_block_size(reader: R, samples: usize) -> Self {
        Self {
            reader,
            buf: vec![0; samples.max(1) * 2],
            exhausted: false,
        }
    }
}

impl<R: Read + Send> PowerSampler for IqStreamSampler<R> {
    fn sample_power(&mut self) -> f64 {
        if self.exhausted {
            return NOISE_FLOOR_DB;
        }
        match self.reader.read_exact(&mut self.buf) {
            Ok(()) => power_db(&self.buf),
            Err(e) => {
                warn!("IQ stream read failed: {}", e);
                self.exhausted = true;
                NOISE_FLOOR_DB
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_db_empty_is_noise_floor() {
        assert_eq!(power_db(&[]), NOISE_FLOOR_DB);
        assert_eq!(power_db(&[200]), NOISE_FLOOR_DB);
    }

    #[test]
    fn test_power_db_full_scale() {
        // |z|^2 = 1 + 1 = 2 → 10*log10(2)
        let p = power_db(&[255, 255, 255, 255]);
        assert!((p - 10.0 * 2f64.log10()).abs() < 1e-9, "{}", p);
    }

    #[test]
    fn test_closure_sampler() {
        let mut readings = vec![-40.0, -50.0].into_iter();
        let mut sampler = move || readings.next().unwrap_or(NOISE_FLOOR_DB);
        assert_eq!(sampler.sample_power(), -40.0);
        assert_eq!(sampler.sample_power(), -50.0);
        assert_eq!(sampler.sample_power(), NOISE_FLOOR_DB);
    }

    #[test]
    fn test_iq_stream_sampler() {
        let mut data = vec![255u8; 8];
        data.extend([128u8, 127, 128, 127, 128, 127, 128, 127]);
        let mut sampler = IqStreamSampler::with_block_size(std::io::Cursor::new(data), 4);

        assert!((sampler.sample_power() - 10.0 * 2f64.log10()).abs() < 1e-9);
        assert!(sampler.sample_power() < -40.0);
        // 流结束
        assert_eq!(sampler.sample_power(), NOISE_FLOOR_DB);
        assert_eq!(sampler.sample_power(), NOISE_FLOOR_DB);
    }

    #[test]
    fn test_sampler_slot() {
        let slot = sampler_slot(None);
        assert!(slot.lock().is_none());
        *slot.lock() = Some(Box::new(|| -42.0));
        let reading = slot.lock().as_mut().map(|s| s.sample_power());
        assert_eq!(reading, Some(-42.0));
    }
}
