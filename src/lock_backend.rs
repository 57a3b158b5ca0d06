use tilescope_core::{Error, LockBackend};
use web_sys::Storage;

/// Origin-scoped localStorage as the durable half of the lock store.
pub(crate) struct LocalStorageBackend {
    storage: Storage,
}

impl LocalStorageBackend {
    pub(crate) fn open() -> Result<Self, Error> {
        let storage = web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or_else(|| Error::StoreUnavailable("localStorage unavailable".to_string()))?;
        Ok(Self { storage })
    }
}

impl LockBackend for LocalStorageBackend {
    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.storage
            .set_item(key, value)
            .map_err(|_| Error::StoreUnavailable("localStorage set failed".to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.storage
            .remove_item(key)
            .map_err(|_| Error::StoreUnavailable("localStorage remove failed".to_string()))
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, Error> {
        let length = self
            .storage
            .length()
            .map_err(|_| Error::StoreUnavailable("localStorage length failed".to_string()))?;
        let mut out = Vec::new();
        for index in 0..length {
            let Ok(Some(key)) = self.storage.key(index) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            if let Ok(Some(value)) = self.storage.get_item(&key) {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}
