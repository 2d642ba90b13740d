pub const GATEWAY_DEFAULT_HOST: &str = "127.0.0.1";
pub const GATEWAY_DEFAULT_PORT: u16 = 4010;
pub const GATEWAY_USER_AGENT: &str = "seerr-gateway/0.1";
/// Optional mount prefix the gateway routes may be served under.
pub const GATEWAY_MOUNT_PREFIX: &str = "/api/seerr";

pub const HEADER_SEERR_URL: &str = "x-seerr-url";
pub const HEADER_SEERR_API_KEY: &str = "x-seerr-api-key";
pub const HEADER_SEERR_SESSION: &str = "x-seerr-session";
pub const HEADER_SEERR_USERNAME: &str = "x-seerr-username";
pub const HEADER_SEERR_PASSWORD: &str = "x-seerr-password";
pub const HEADER_SEERR_AUTH_TYPE: &str = "x-seerr-auth-type";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

pub const UPSTREAM_API_KEY_HEADER: &str = "x-api-key";
pub const CONFIG_PATH_ENV: &str = "SEERR_GATEWAY_CONFIG";
