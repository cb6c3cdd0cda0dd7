mod middleware;
mod site;

pub use middleware::RequestContext;
pub use site::{APOLOGY, SiteState, build_router};
