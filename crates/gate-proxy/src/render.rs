//! Error-page rendering boundary.
//!
//! Rejections on ordinary listeners are user-visible HTML; the renderer is
//! a collaborator so platforms can swap in their own branding.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Unified response body for the dispatcher: rendered pages and relayed
/// backend bodies share it.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

pub(crate) fn full_body(text: impl Into<Bytes>) -> ProxyBody {
    Full::new(text.into()).map_err(|never| match never {}).boxed()
}

pub(crate) fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Renders an in-protocol rejection. `severe` selects between the
/// apologetic platform-fault page and the terse user-fault one.
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, message: &str, severe: bool, status: StatusCode) -> Response<ProxyBody>;
}

/// Default HTML renderer. The instance label (container short id on the
/// platform) appears on every page so support can locate the gateway that
/// produced it.
pub struct HtmlErrorRenderer {
    instance_label: String,
}

impl HtmlErrorRenderer {
    pub fn new(instance_label: impl Into<String>) -> Self {
        Self {
            instance_label: instance_label.into(),
        }
    }
}

impl ErrorRenderer for HtmlErrorRenderer {
    fn render(&self, message: &str, severe: bool, status: StatusCode) -> Response<ProxyBody> {
        let label = &self.instance_label;
        let html = if severe {
            format!(
                concat!(
                    "<h1>An error has occurred.</h1>",
                    "<p>We're deeply sorry about this. Please forward this ",
                    "information to your platform support so the issue can be ",
                    "resolved quickly.</p>",
                    "<b>Error</b>: {message}<br />",
                    "<b>Gateway</b>: {label}",
                ),
                message = message,
                label = label,
            )
        } else {
            format!("<b>{message}</b><br /><br />GID: {label}")
        };

        let mut response = Response::new(full_body(html));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        response
    }
}
