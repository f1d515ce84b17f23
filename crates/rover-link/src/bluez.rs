//! BlueZ 后端（基于 `bluer`）
//!
//! 通过 D-Bus 访问系统蓝牙服务：扫描 → 连接 → 等待服务解析 → 定位可写特征值。
//! 指令以 Write Without Response（`WriteOp::Command`）写入，与 HM-10/JDY-16
//! 这类透传模块的工作方式一致。

use crate::{DeviceInfo, LinkDeviceError, LinkDeviceErrorKind, LinkError, Transport};
use bluer::gatt::WriteOp;
use bluer::gatt::remote::{Characteristic, CharacteristicWriteRequest};
use bluer::{Adapter, AdapterEvent, Address, Device, Session, Uuid};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, trace, warn};

/// 透传模块的默认服务 UUID
pub const DEFAULT_SERVICE_UUID: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";

/// 透传模块的默认可写特征值 UUID
pub const DEFAULT_CHARACTERISTIC_UUID: &str = "0000ffe3-0000-1000-8000-00805f9b34fb";

/// BlueZ 后端配置
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    /// 单次连接的超时
    pub connect_timeout: Duration,
    /// 连接后等待 GATT 服务解析的超时
    pub resolve_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb),
            characteristic_uuid: Uuid::from_u128(0x0000ffe3_0000_1000_8000_00805f9b34fb),
            connect_timeout: Duration::from_secs(10),
            resolve_timeout: Duration::from_secs(5),
        }
    }
}

impl LinkConfig {
    /// 从环境变量 `SERVICE_UUID` / `CHARACTERISTIC_UUID` 覆盖默认值
    ///
    /// 无法解析的值会被忽略（记录 warn 日志）。
    pub fn from_env() -> Self {
        Self::default().env_overrides()
    }

    /// 使用字符串形式的 UUID（通常来自配置文件），环境变量仍然优先
    pub fn from_uuid_strs(service_uuid: &str, characteristic_uuid: &str) -> Self {
        let mut config = Self::default();
        if let Some(uuid) = parse_uuid("service UUID", service_uuid) {
            config.service_uuid = uuid;
        }
        if let Some(uuid) = parse_uuid("characteristic UUID", characteristic_uuid) {
            config.characteristic_uuid = uuid;
        }
        config.env_overrides()
    }

    fn env_overrides(mut self) -> Self {
        if let Some(uuid) = std::env::var("SERVICE_UUID")
            .ok()
            .and_then(|raw| parse_uuid("SERVICE_UUID", &raw))
        {
            self.service_uuid = uuid;
        }
        if let Some(uuid) = std::env::var("CHARACTERISTIC_UUID")
            .ok()
            .and_then(|raw| parse_uuid("CHARACTERISTIC_UUID", &raw))
        {
            self.characteristic_uuid = uuid;
        }
        self
    }

    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    pub fn with_characteristic_uuid(mut self, uuid: Uuid) -> Self {
        self.characteristic_uuid = uuid;
        self
    }
}

fn parse_uuid(what: &str, raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(uuid) => Some(uuid),
        Err(e) => {
            warn!("Ignoring invalid {} '{}': {}", what, raw, e);
            None
        },
    }
}

/// 已连接设备的句柄
pub struct BluezHandle {
    address: Address,
    device: Device,
    characteristic: Characteristic,
}

impl fmt::Debug for BluezHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluezHandle").field("address", &self.address).finish()
    }
}

/// BlueZ 传输
///
/// 会话和适配器在 `prepare()` 中打开，之后所有操作复用。
#[derive(Clone)]
pub struct BluezTransport {
    config: LinkConfig,
    session: Option<Session>,
    adapter: Option<Adapter>,
}

impl fmt::Debug for BluezTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluezTransport")
            .field("config", &self.config)
            .field("adapter", &self.adapter.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}

impl BluezTransport {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            session: None,
            adapter: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    async fn adapter(&mut self) -> Result<Adapter, LinkError> {
        if self.adapter.is_none() {
            self.prepare().await?;
        }
        self.adapter.clone().ok_or_else(|| {
            LinkError::Device(LinkDeviceError::new(
                LinkDeviceErrorKind::NoAdapter,
                "bluetooth adapter unavailable",
            ))
        })
    }

    async fn wait_services_resolved(&self, device: &Device) -> Result<(), LinkError> {
        let deadline = Instant::now() + self.config.resolve_timeout;
        while !device.is_services_resolved().await.map_err(map_bluer_error)? {
            if Instant::now() >= deadline {
                return Err(LinkError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    async fn find_characteristic(&self, device: &Device) -> Result<Characteristic, LinkError> {
        for service in device.services().await.map_err(map_bluer_error)? {
            if service.uuid().await.map_err(map_bluer_error)? != self.config.service_uuid {
                continue;
            }
            for characteristic in service.characteristics().await.map_err(map_bluer_error)? {
                if characteristic.uuid().await.map_err(map_bluer_error)?
                    == self.config.characteristic_uuid
                {
                    return Ok(characteristic);
                }
            }
            return Err(LinkError::ServiceNotFound(format!(
                "characteristic {}",
                self.config.characteristic_uuid
            )));
        }
        Err(LinkError::ServiceNotFound(format!(
            "service {}",
            self.config.service_uuid
        )))
    }
}

impl Default for BluezTransport {
    fn default() -> Self {
        Self::new(LinkConfig::from_env())
    }
}

impl Transport for BluezTransport {
    type Handle = BluezHandle;

    async fn prepare(&mut self) -> Result<(), LinkError> {
        let session = Session::new().await.map_err(map_bluer_error)?;
        let adapter = session.default_adapter().await.map_err(map_bluer_error)?;
        adapter.set_powered(true).await.map_err(map_bluer_error)?;
        info!("BlueZ adapter {} ready", adapter.name());
        self.session = Some(session);
        self.adapter = Some(adapter);
        Ok(())
    }

    async fn scan(&mut self, scan_timeout: Duration) -> Result<Vec<DeviceInfo>, LinkError> {
        let adapter = self.adapter().await?;

        let mut addresses: BTreeSet<Address> = adapter
            .device_addresses()
            .await
            .map_err(map_bluer_error)?
            .into_iter()
            .collect();

        // 丢弃发现流即停止扫描
        let discovery = adapter.discover_devices().await.map_err(map_bluer_error)?;
        let mut stream = Box::pin(discovery);
        let deadline = Instant::now() + scan_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, stream.next()).await {
                Ok(Some(AdapterEvent::DeviceAdded(addr))) => {
                    trace!("Discovered {}", addr);
                    addresses.insert(addr);
                },
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        drop(stream);

        let mut devices = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let Ok(device) = adapter.device(addr) else {
                continue;
            };
            let name = device.name().await.ok().flatten();
            devices.push(DeviceInfo::new(addr.to_string(), name.as_deref()));
        }
        debug!("Scan finished, {} devices", devices.len());
        Ok(devices)
    }

    async fn connect(&mut self, id: &str) -> Result<BluezHandle, LinkError> {
        let adapter = self.adapter().await?;
        let address: Address = id
            .parse()
            .map_err(|_| LinkError::DeviceNotFound(id.to_string()))?;
        let device = adapter.device(address).map_err(map_bluer_error)?;

        if !device.is_connected().await.map_err(map_bluer_error)? {
            timeout(self.config.connect_timeout, device.connect())
                .await
                .map_err(|_| LinkError::Timeout)?
                .map_err(map_bluer_error)?;
        }

        self.wait_services_resolved(&device).await?;
        let characteristic = self.find_characteristic(&device).await?;
        info!("Connected to {} ({})", address, self.config.characteristic_uuid);

        Ok(BluezHandle {
            address,
            device,
            characteristic,
        })
    }

    async fn is_connected(&self, handle: &BluezHandle) -> bool {
        handle.device.is_connected().await.unwrap_or(false)
    }

    async fn write(&mut self, handle: &BluezHandle, data: &[u8]) -> Result<(), LinkError> {
        let request = CharacteristicWriteRequest {
            op_type: WriteOp::Command,
            ..Default::default()
        };
        handle
            .characteristic
            .write_ext(data, &request)
            .await
            .map_err(map_bluer_error)
    }

    async fn disconnect(&mut self, handle: BluezHandle) -> Result<(), LinkError> {
        if handle.device.is_connected().await.unwrap_or(false) {
            handle.device.disconnect().await.map_err(map_bluer_error)?;
        }
        info!("Disconnected from {}", handle.address);
        Ok(())
    }
}

/// 将 `bluer::Error` 映射为结构化设备错误
fn map_bluer_error(e: bluer::Error) -> LinkError {
    use bluer::ErrorKind;

    let kind = match &e.kind {
        ErrorKind::NotPermitted | ErrorKind::NotAuthorized => LinkDeviceErrorKind::AccessDenied,
        ErrorKind::InProgress => LinkDeviceErrorKind::Busy,
        ErrorKind::NotReady => LinkDeviceErrorKind::NoAdapter,
        ErrorKind::NotFound | ErrorKind::DoesNotExist => LinkDeviceErrorKind::Disconnected,
        _ => LinkDeviceErrorKind::Backend,
    };
    LinkError::Device(LinkDeviceError::new(kind, e.to_string()))
}
