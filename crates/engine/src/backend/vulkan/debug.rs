use crate::error::{EngineResult, VkResultExt};
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};

const VALIDATION_LAYERS: [&CStr; 1] = [c"VK_LAYER_KHRONOS_validation"];

pub fn layer_name_pointers() -> Vec<*const c_char> {
    VALIDATION_LAYERS.iter().map(|name| name.as_ptr()).collect()
}

/// Whether every validation layer is installed. Missing layers only disable validation.
pub fn check_validation_layer_support(vulkan_fn: &Entry) -> bool {
    let layer_properties = match unsafe { vulkan_fn.enumerate_instance_layer_properties() } {
        Ok(properties) => properties,
        Err(err) => {
            log::warn!("Unable to enumerate instance layers: {err}");
            return false;
        }
    };

    VALIDATION_LAYERS.iter().all(|required| {
        let found = layer_properties
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == *required));
        if !found {
            log::warn!("Validation layer {required:?} not available, continuing without it");
        }
        found
    })
}

pub fn setup_debug_messenger(
    vulkan_fn: &Entry,
    instance: &Instance,
) -> EngineResult<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    let debug_utils = debug_utils::Instance::new(vulkan_fn, instance);
    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .vk_op("vkCreateDebugUtilsMessengerEXT")?;

    Ok((debug_utils, messenger))
}

unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = unsafe { p_callback_data.as_ref() }
        .and_then(|data| unsafe { data.message_as_c_str() })
        .map(CStr::to_string_lossy)
        .unwrap_or(Cow::Borrowed("<no message>"));

    let level = match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(level, "{message_type:?} {message}");

    vk::FALSE
}
