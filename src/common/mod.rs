pub mod errors;

/// Fixed frame every normalized derivative is cropped to.
pub const NORMALIZED_WIDTH: u32 = 640;

pub const NORMALIZED_HEIGHT: u32 = 480;

/// Blur hash component grid (x, y).
pub const BLURHASH_COMPONENTS: (u32, u32) = (4, 4);

pub const DEFAULT_GRANT_EXPIRY_SECS: u64 = 300;

pub const DEFAULT_TRANSFORM_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_TRANSFORM_ATTEMPTS: u32 = 3;

pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

pub const DATABASE_FILE: &str = "miniinsta.redb";

/// Content types accepted by the grant issuer and the extension each upload is stored under.
pub const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == content_type)
        .map(|(_, ext)| *ext)
}
