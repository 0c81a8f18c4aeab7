pub mod device_handle;
pub mod registry;
