//! `Handle`: a (backend, device-id, stream) triple owning a shared,
//! weak-pointer-cached runtime instance and a shared, weak-pointer-cached
//! device. Mirrors the reference implementation's process-wide singleton
//! plus per-configuration device cache, modeled here with `Mutex`-guarded
//! `Weak` maps pruned on lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::backend::Backend;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::ffi::runtime_api;

pub struct RuntimeInstance {
    pub(crate) raw: *mut std::ffi::c_void,
}

// SAFETY: the runtime's instance handle is documented safe to share across
// threads; all mutation happens through its own internal locking.
unsafe impl Send for RuntimeInstance {}
unsafe impl Sync for RuntimeInstance {}

impl Drop for RuntimeInstance {
    fn drop(&mut self) {
        if let Ok(api) = runtime_api() {
            unsafe { (api.instance_release)(self.raw) };
        }
    }
}

static INSTANCE: Mutex<Weak<RuntimeInstance>> = Mutex::new(Weak::new());

fn shared_instance() -> Result<Arc<RuntimeInstance>> {
    let mut slot = INSTANCE.lock().unwrap();
    if let Some(existing) = slot.upgrade() {
        return Ok(existing);
    }
    let api = runtime_api()?;
    let raw = unsafe { (api.instance_create)() };
    if raw.is_null() {
        return Err(Error::new(ErrorKind::RuntimeFailure, "failed to create runtime instance"));
    }
    let instance = Arc::new(RuntimeInstance { raw });
    *slot = Arc::downgrade(&instance);
    Ok(instance)
}

pub struct Device {
    pub(crate) raw: *mut std::ffi::c_void,
    #[allow(dead_code)]
    instance: Arc<RuntimeInstance>,
    pub backend: Backend,
    pub device_id: u32,
}

unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Drop for Device {
    fn drop(&mut self) {
        if let Ok(api) = runtime_api() {
            unsafe { (api.device_release)(self.raw) };
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct DeviceKey {
    backend: Backend,
    device_id: u32,
    stream: usize,
}

static DEVICE_CACHE: Mutex<Option<HashMap<DeviceKey, Weak<Device>>>> = Mutex::new(None);

fn shared_device(instance: &Arc<RuntimeInstance>, backend: Backend, device_id: u32, stream: usize) -> Result<Arc<Device>> {
    let key = DeviceKey { backend, device_id, stream };
    let mut cache = DEVICE_CACHE.lock().unwrap();
    let map = cache.get_or_insert_with(HashMap::new);
    map.retain(|_, weak| weak.strong_count() > 0);
    if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
        return Ok(existing);
    }
    let api = runtime_api()?;
    let driver_name = std::ffi::CString::new(backend.hal_driver_name()).unwrap();
    let raw = unsafe { (api.device_create)(instance.raw, driver_name.as_ptr(), device_id as i32) };
    if raw.is_null() {
        return Err(Error::new(
            ErrorKind::RuntimeFailure,
            format!("failed to create device for backend {backend:?} id {device_id}"),
        ));
    }
    let device = Arc::new(Device {
        raw,
        instance: Arc::clone(instance),
        backend,
        device_id,
    });
    map.insert(key, Arc::downgrade(&device));
    Ok(device)
}

/// A handle to a specific runtime device, plus the process-wide instance it
/// was created from. `Graph::compile`/`execute` take a `&Handle`.
pub struct Handle {
    instance: Arc<RuntimeInstance>,
    device: Arc<Device>,
    stream: usize,
}

impl Handle {
    /// `stream` is an opaque external-stream identifier; 0 means "default
    /// (null) stream". Only meaningful for `Backend::Amdgpu`.
    pub fn create(backend: Backend, device_id: u32, stream: usize) -> Result<Self> {
        let instance = shared_instance()?;
        let device = shared_device(&instance, backend, device_id, stream)?;
        Ok(Self { instance, device, stream })
    }

    pub fn backend(&self) -> Backend {
        self.device.backend
    }

    pub fn device_id(&self) -> u32 {
        self.device.device_id
    }

    pub fn stream(&self) -> usize {
        self.stream
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn instance(&self) -> &Arc<RuntimeInstance> {
        &self.instance
    }
}
