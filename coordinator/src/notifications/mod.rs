//! Notification fan-out: durable rows, live connections, an in-memory pool for offline users,
//! and web push.

mod registry;
mod service;

pub(crate) use registry::{ConnectionRegistry, LiveChannel};
pub(crate) use service::{NotificationError, NotificationService};

