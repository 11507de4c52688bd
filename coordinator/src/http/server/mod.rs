//! Router assembly and the middleware stack around it.

pub(crate) mod middleware;
pub(crate) mod router;
