//! BlueZ central transport

use bluer::{
    Adapter, AdapterEvent, Address, Device,
    gatt::remote::{Characteristic, Service},
};
use futures::{StreamExt, pin_mut};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    core::{
        error::{TransportError, TransportResult},
        types::DeviceHandle,
    },
    transport::{
        NotifyHandler, Transport,
        ble::{
            slot::{Link, LinkSlot},
            uuids::{CREDENTIAL_CHAR_UUID, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID},
        },
    },
};

fn ble_error(e: bluer::Error) -> TransportError {
    TransportError::Ble(e.to_string())
}

async fn tear_down(mut link: Link<Device, Characteristic>) -> TransportResult<()> {
    link.abort_notifications();
    if !link.device.is_connected().await.map_err(ble_error)? {
        return Ok(());
    }
    link.device.disconnect().await.map_err(ble_error)?;
    info!(address = %link.device.address(), "Disconnected from peripheral");
    Ok(())
}

/// [`Transport`] talking to a real peripheral through BlueZ
pub struct BluerTransport {
    adapter: Adapter,
    handler: Mutex<Option<NotifyHandler>>,
    link: Mutex<LinkSlot<Device, Characteristic>>,
}

impl BluerTransport {
    /// Open the default adapter and power it on
    pub async fn new() -> Result<Self, bluer::Error> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;

        info!("Using BLE adapter: {}", adapter.name());

        Ok(Self {
            adapter,
            handler: Mutex::new(None),
            link: Mutex::new(LinkSlot::default()),
        })
    }

    /// Run discovery until `address` is known to BlueZ
    async fn discover(&self, address: Address) -> TransportResult<Device> {
        if !self
            .adapter
            .device_addresses()
            .await
            .map_err(ble_error)?
            .contains(&address)
        {
            debug!(%address, "Device unknown, discovering");
            let events = self.adapter.discover_devices().await.map_err(ble_error)?;
            pin_mut!(events);
            loop {
                match events.next().await {
                    Some(AdapterEvent::DeviceAdded(found)) if found == address => break,
                    Some(_) => continue,
                    None => return Err(TransportError::ConnectFailed("discovery ended".into())),
                }
            }
        }

        self.adapter.device(address).map_err(ble_error)
    }

    async fn provisioning_service(device: &Device) -> TransportResult<Service> {
        for service in device.services().await.map_err(ble_error)? {
            if service.uuid().await.map_err(ble_error)? == PROVISIONING_SERVICE_UUID {
                return Ok(service);
            }
        }
        Err(TransportError::ServiceNotFound)
    }

    async fn characteristics(service: &Service) -> TransportResult<(Characteristic, Characteristic)> {
        let mut credential = None;
        let mut status = None;
        for characteristic in service.characteristics().await.map_err(ble_error)? {
            match characteristic.uuid().await.map_err(ble_error)? {
                uuid if uuid == CREDENTIAL_CHAR_UUID => credential = Some(characteristic),
                uuid if uuid == STATUS_CHAR_UUID => status = Some(characteristic),
                _ => {}
            }
        }
        match (credential, status) {
            (Some(credential), Some(status)) => Ok((credential, status)),
            _ => Err(TransportError::ServiceNotFound),
        }
    }

    /// Connect the radio and resolve the provisioning characteristics
    async fn establish(&self, peer: &Device) -> TransportResult<(Characteristic, JoinHandle<()>)> {
        if !peer.is_connected().await.map_err(ble_error)? {
            peer.connect()
                .await
                .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        }
        info!(address = %peer.address(), "Connected to peripheral");

        let service = Self::provisioning_service(peer).await?;
        let (credential, status) = Self::characteristics(&service).await?;
        let notify_task = self.forward_notifications(&status).await?;
        Ok((credential, notify_task))
    }

    async fn forward_notifications(
        &self,
        status: &Characteristic,
    ) -> TransportResult<JoinHandle<()>> {
        let notifications = status.notify().await.map_err(ble_error)?;
        let handler = self.handler.lock().await.clone();

        Ok(tokio::spawn(async move {
            pin_mut!(notifications);
            while let Some(value) = notifications.next().await {
                debug!(frame = %hex::encode(&value), "Status notification");
                match &handler {
                    Some(handler) if handler.send(value).is_ok() => {}
                    _ => {
                        warn!("No session listening, dropping notification");
                    }
                }
            }
            debug!("Status notifications ended");
        }))
    }
}

impl Transport for BluerTransport {
    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()> {
        let address: Address = device
            .as_str()
            .parse()
            .map_err(|_| TransportError::ConnectFailed(format!("invalid address {device}")))?;

        let peer = self.discover(address).await?;
        let stale = self.link.lock().await.begin(peer.clone());
        if let Some(stale) = stale {
            if let Err(e) = tear_down(stale).await {
                warn!("Failed to drop stale link: {}", e);
            }
        }

        match self.establish(&peer).await {
            Ok((credential, notify_task)) => {
                if let Err((_, notify_task)) = self.link.lock().await.attach(credential, notify_task) {
                    notify_task.abort();
                    return Err(TransportError::NotConnected);
                }
                info!(%address, "Provisioning link ready");
                Ok(())
            }
            Err(e) => {
                warn!(%address, "Link setup failed: {}", e);
                if let Some(link) = self.link.lock().await.take() {
                    if let Err(e) = tear_down(link).await {
                        warn!("Disconnect after failed setup failed: {}", e);
                    }
                }
                Err(e)
            }
        }
    }

    async fn write(&self, bytes: &[u8]) -> TransportResult<()> {
        let link = self.link.lock().await;
        let credential = link.credential().ok_or(TransportError::NotConnected)?;
        credential
            .write(bytes)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn set_notify_handler(&self, handler: NotifyHandler) {
        *self.handler.lock().await = Some(handler);
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let Some(link) = self.link.lock().await.take() else {
            return Ok(());
        };
        tear_down(link).await
    }
}
