//! Vulkan instance management.
//!
//! This module handles VkInstance creation, validation layers, and the debug
//! messenger that forwards validation output to `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use flightdeck_rhi::instance::Instance;
//!
//! // Headless instance (no surface extensions) with the Khronos layer
//! let layers = vec!["VK_LAYER_KHRONOS_validation".to_string()];
//! let instance = Instance::new(true, &layers, &[]).expect("Failed to create Vulkan instance");
//! let _ = instance.handle();
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// Vulkan instance wrapper with optional validation layer support.
///
/// Dropping it destroys the debug messenger and then the instance, so it must
/// outlive every object created from it.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils extension loader (only present when validation is enabled)
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    /// Debug messenger handle (only present when validation is enabled)
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Layers that were actually enabled, reused for device creation
    enabled_layers: Vec<CString>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `enable_validation` - Enables `layer_names` and the debug messenger
    /// * `layer_names` - Validation layers to request
    /// * `surface_extensions` - Window-system extensions, empty for headless use
    ///
    /// Missing layers are reported and skipped rather than failing creation.
    pub fn new(
        enable_validation: bool,
        layer_names: &[String],
        surface_extensions: &[*const c_char],
    ) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let enabled_layers = if enable_validation {
            Self::available_layers(&entry, layer_names)?
        } else {
            Vec::new()
        };
        let validation_available = enable_validation && !enabled_layers.is_empty();

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"flightdeck")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"flightdeck")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = surface_extensions.to_vec();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_ptrs: Vec<*const c_char> = enabled_layers.iter().map(|l| l.as_ptr()).collect();

        // Chained so instance creation and destruction are covered by the messenger too
        let mut instance_messenger_info = messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);
        if validation_available {
            create_info = create_info.push_next(&mut instance_messenger_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created ({} extensions, {} layers)",
            extensions.len(),
            layer_ptrs.len()
        );

        let (debug_utils, debug_messenger) = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = unsafe {
                debug_utils.create_debug_utils_messenger(&messenger_create_info(), None)
            };
            match messenger {
                Ok(messenger) => {
                    info!("Validation layers enabled");
                    (Some(debug_utils), Some(messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(RhiError::from(e));
                }
            }
        } else {
            if enable_validation {
                warn!("Validation layers were requested but none are available");
            }
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            enabled_layers,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Layers enabled on this instance.
    pub fn enabled_layers(&self) -> &[CString] {
        &self.enabled_layers
    }

    /// Filters `requested` down to the layers the loader reports.
    fn available_layers(entry: &Entry, requested: &[String]) -> RhiResult<Vec<CString>> {
        let available = unsafe { entry.enumerate_instance_layer_properties()? };

        let mut enabled = Vec::with_capacity(requested.len());
        for name in requested {
            let found = available.iter().any(|layer| {
                let layer_name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                layer_name.to_bytes() == name.as_bytes()
            });
            if !found {
                warn!("Validation layer '{}' not available", name);
                continue;
            }
            match CString::new(name.as_str()) {
                Ok(c_name) => enabled.push(c_name),
                Err(_) => warn!("Skipping layer name with interior NUL: {:?}", name),
            }
        }
        debug!("Enabled layers: {:?}", enabled);
        Ok(enabled)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Forwards validation layer messages to `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader; `p_callback_data` is either null or valid for
/// the duration of the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!("[Vulkan {}] {}", type_str, message);
        }
        _ => {
            debug!("[Vulkan {}] {}", type_str, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_instance_without_validation() {
        match Instance::new(false, &[], &[]) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert!(instance.enabled_layers().is_empty());
            }
            Err(e) => eprintln!("Skipping test: Vulkan not available ({e})"),
        }
    }

    #[test]
    fn test_unknown_layer_is_skipped() {
        let layers = vec!["VK_LAYER_flightdeck_does_not_exist".to_string()];
        match Instance::new(true, &layers, &[]) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert!(instance.enabled_layers().is_empty());
            }
            Err(e) => eprintln!("Skipping test: Vulkan not available ({e})"),
        }
    }

    #[test]
    fn test_messenger_info_covers_warnings_and_errors() {
        let info = messenger_create_info();
        assert!(
            info.message_severity
                .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING)
        );
        assert!(
            info.message_severity
                .contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR)
        );
        assert!(info.pfn_user_callback.is_some());
    }
}
