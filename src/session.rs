use axum::http::HeaderMap;
use base64ct::Encoding;
use rand::RngCore;

pub const RENDER_SESSION_HEADER: &str = "x-umbra-render-session";

/// Opaque key identifying one render session.
///
/// The hosting renderer obtains a key at the start of a render pass,
/// threads it through the annotation and filtering passes, and resets the
/// registry with it when the pass ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderSessionKey(String);

impl RenderSessionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(base64ct::Base64UrlUnpadded::encode_string(&bytes))
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(RENDER_SESSION_HEADER)?.to_str().ok()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
