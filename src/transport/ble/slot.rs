//! Bookkeeping for the single peripheral link of the BLE central

use tokio::task::JoinHandle;

/// A peripheral the central touched, with whatever was resolved on it so far
#[derive(Debug)]
pub(crate) struct Link<D, C> {
    pub device: D,
    pub credential: Option<C>,
    pub notify_task: Option<JoinHandle<()>>,
}

impl<D, C> Link<D, C> {
    /// Stop forwarding notifications; the device itself is left to the caller
    pub fn abort_notifications(&mut self) {
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
    }
}

/// Holds the link from the first connect attempt on
///
/// The device is recorded before the radio connects, so a failed or abandoned
/// connect still leaves something for `disconnect` to tear down.
#[derive(Debug)]
pub(crate) struct LinkSlot<D, C> {
    link: Option<Link<D, C>>,
}

impl<D, C> Default for LinkSlot<D, C> {
    fn default() -> Self {
        Self { link: None }
    }
}

impl<D, C> LinkSlot<D, C> {
    /// Record `device` as the current peer, returning a stale link to tear down
    pub fn begin(&mut self, device: D) -> Option<Link<D, C>> {
        self.link.replace(Link {
            device,
            credential: None,
            notify_task: None,
        })
    }

    /// Complete the current link once services are resolved
    ///
    /// Returns the pieces back if there is no link to attach them to.
    pub fn attach(
        &mut self,
        credential: C,
        notify_task: JoinHandle<()>,
    ) -> Result<(), (C, JoinHandle<()>)> {
        match self.link.as_mut() {
            Some(link) => {
                link.abort_notifications();
                link.credential = Some(credential);
                link.notify_task = Some(notify_task);
                Ok(())
            }
            None => Err((credential, notify_task)),
        }
    }

    /// Writable characteristic of a fully established link
    pub fn credential(&self) -> Option<&C> {
        self.link.as_ref()?.credential.as_ref()
    }

    pub fn take(&mut self) -> Option<Link<D, C>> {
        self.link.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_task() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn test_half_open_link_is_still_torn_down() {
        let mut slot: LinkSlot<&str, u8> = LinkSlot::default();
        assert!(slot.begin("AA:BB:CC:DD:EE:FF").is_none());

        // Service resolution failed: nothing attached, not writable
        assert!(slot.credential().is_none());

        let link = slot.take().unwrap();
        assert_eq!(link.device, "AA:BB:CC:DD:EE:FF");
        assert!(link.credential.is_none());
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_attach_makes_link_writable() {
        let mut slot: LinkSlot<&str, u8> = LinkSlot::default();
        slot.begin("AA:BB:CC:DD:EE:FF");

        assert!(slot.attach(7, idle_task()).is_ok());
        assert_eq!(slot.credential(), Some(&7));
    }

    #[tokio::test]
    async fn test_attach_without_link_hands_pieces_back() {
        let mut slot: LinkSlot<&str, u8> = LinkSlot::default();
        let task = idle_task();

        let (credential, task) = slot.attach(3, task).unwrap_err();
        assert_eq!(credential, 3);
        task.abort();
    }

    #[tokio::test]
    async fn test_begin_returns_stale_link() {
        let mut slot: LinkSlot<&str, u8> = LinkSlot::default();
        slot.begin("11:11:11:11:11:11");
        slot.attach(1, idle_task()).unwrap();

        let mut stale = slot.begin("22:22:22:22:22:22").unwrap();
        assert_eq!(stale.device, "11:11:11:11:11:11");
        assert!(stale.notify_task.is_some());
        stale.abort_notifications();
        assert!(stale.notify_task.is_none());

        assert!(slot.credential().is_none());
        assert_eq!(slot.take().unwrap().device, "22:22:22:22:22:22");
    }
}
