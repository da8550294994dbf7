//! Rendering-context selection.
//!
//! The coordinate probe lives in the page's DOM, so it is only visible from
//! the embedded web view's context. [`select_render_context`] moves the
//! device handle there.

use tracing::{info, warn};

use crate::driver::{DeviceControl, DriverError, RenderContext};

/// Returns the first web-like context id in `contexts`, if any.
pub fn find_web_context(contexts: &[String]) -> Option<&str> {
    contexts
        .iter()
        .map(String::as_str)
        .find(|id| RenderContext::is_web_id(id))
}

/// Switches `device` to the first embedded web context it exposes.
///
/// Takes a single snapshot of the context list; there is no retry, so the
/// target app must have finished bootstrapping its web surface before this
/// is called.
///
/// # Returns
///
/// `Ok(true)` with the device in the web context, or `Ok(false)` with the
/// device untouched when no web context exists. Driver failures while
/// listing or switching propagate.
pub async fn select_render_context<D>(device: &mut D) -> Result<bool, DriverError>
where
    D: DeviceControl + ?Sized,
{
    let contexts = device.context_ids().await?;
    switch_to_web_context(device, &contexts).await
}

/// Like [`select_render_context`], but decides from an already taken
/// snapshot of the context list instead of listing again.
pub async fn switch_to_web_context<D>(device: &mut D, contexts: &[String]) -> Result<bool, DriverError>
where
    D: DeviceControl + ?Sized,
{
    info!(?contexts, "available contexts");

    let Some(target) = find_web_context(contexts) else {
        warn!("no web context found");
        return Ok(false);
    };

    info!(context = target, "switching to web context");
    device.switch_context(RenderContext::Web(target.to_string())).await?;
    info!(context = %device.active_context(), "now in context");
    Ok(true)
}
