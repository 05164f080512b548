//! Channels: methods only, compared by identity

use crate::error::Error;
use crate::proxy::Proxy;

pub(super) fn eq(proxy: &Proxy, other: &Proxy) -> Result<bool, Error> {
    if other.is_pointer_form() {
        return Err(Error::comparison("==", "mixed chan value and pointer"));
    }
    let (a, b) = (proxy.value(), other.value());
    Ok(match (a.as_chan(), b.as_chan()) {
        (Some(a), Some(b)) => a.same(b),
        _ => false,
    })
}
